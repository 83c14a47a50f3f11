//! Identity records on commits: `<name> <<email>> <unix-seconds> <±HHMM>`.

use chrono::{Local, Offset};

use crate::internal::errors::GyattError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureType {
    Author,
    Committer,
}

impl SignatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureType::Author => "author",
            SignatureType::Committer => "committer",
        }
    }

    pub fn from_tag(tag: &str) -> Result<SignatureType, GyattError> {
        match tag {
            "author" => Ok(SignatureType::Author),
            "committer" => Ok(SignatureType::Committer),
            other => Err(GyattError::BadFormat(format!("signature tag '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub signature_type: SignatureType,
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Offset from UTC rendered as `±HHMM`.
    pub timezone: String,
}

impl Signature {
    /// Build a signature stamped with the current time and local timezone.
    pub fn new(signature_type: SignatureType, name: String, email: String) -> Signature {
        let now = Local::now();
        let offset_secs = now.offset().fix().local_minus_utc();
        Signature {
            signature_type,
            name,
            email,
            timestamp: now.timestamp().max(0) as u64,
            timezone: format_offset(offset_secs),
        }
    }

    /// Render one commit header line, without the trailing newline.
    pub fn to_data(&self) -> String {
        format!(
            "{} {} <{}> {} {}",
            self.signature_type.as_str(),
            self.name,
            self.email,
            self.timestamp,
            self.timezone
        )
    }

    /// Parse one commit header line such as
    /// `author A U Thor <author@example.com> 1736000000 +0100`.
    pub fn from_data(line: &str) -> Result<Signature, GyattError> {
        let malformed = || GyattError::BadFormat(format!("signature line '{line}'"));

        let (tag, rest) = line.split_once(' ').ok_or_else(malformed)?;
        let signature_type = SignatureType::from_tag(tag)?;

        let email_start = rest.find('<').ok_or_else(malformed)?;
        let email_end = rest.find('>').ok_or_else(malformed)?;
        if email_end < email_start {
            return Err(malformed());
        }
        let name = rest[..email_start].trim_end().to_string();
        let email = rest[email_start + 1..email_end].to_string();

        let mut tail = rest[email_end + 1..].split_whitespace();
        let timestamp = tail
            .next()
            .and_then(|t| t.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let timezone = tail.next().ok_or_else(malformed)?.to_string();

        Ok(Signature {
            signature_type,
            name,
            email,
            timestamp,
            timezone,
        })
    }

    /// Offset from UTC in minutes, parsed back out of the `±HHMM` form.
    pub fn tz_offset_minutes(&self) -> i32 {
        let s = self.timezone.as_str();
        if s.len() != 5 {
            return 0;
        }
        let sign = if s.starts_with('-') { -1 } else { 1 };
        let hours: i32 = s[1..3].parse().unwrap_or(0);
        let minutes: i32 = s[3..5].parse().unwrap_or(0);
        sign * (hours * 60 + minutes)
    }
}

fn format_offset(offset_secs: i32) -> String {
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let abs_minutes = offset_secs.abs() / 60;
    format!("{}{:02}{:02}", sign, abs_minutes / 60, abs_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let sig = Signature {
            signature_type: SignatureType::Author,
            name: "A U Thor".to_string(),
            email: "author@example.com".to_string(),
            timestamp: 1736000000,
            timezone: "+0100".to_string(),
        };
        let parsed = Signature::from_data(&sig.to_data()).unwrap();
        assert_eq!(parsed, sig);
        assert_eq!(parsed.tz_offset_minutes(), 60);
    }

    #[test]
    fn negative_offset() {
        assert_eq!(format_offset(-5 * 3600 - 30 * 60), "-0530");
        let sig = Signature::from_data("committer c <c@d> 7 -0530").unwrap();
        assert_eq!(sig.signature_type, SignatureType::Committer);
        assert_eq!(sig.tz_offset_minutes(), -330);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Signature::from_data("author no-email 7 +0000").is_err());
        assert!(Signature::from_data("tagger a <a@b> 7 +0000").is_err());
    }
}
