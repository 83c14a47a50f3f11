//! INI-style repository configuration at `<metadata>/config`, with sections
//! `[core]`, `[user]`, and `[remote "<name>"]` (subsection quoting is
//! preserved on rewrite). Also resolves forge credentials: environment first,
//! then the owner-only token file in the metadata directory.

use std::env;
use std::path::Path;

use crate::internal::errors::GyattError;
use crate::utils::{path, util};

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub name: String,
    pub url: String,
}

/// Transport family a remote URL belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteProtocol {
    Https,
    Ssh,
    Local,
    Unknown,
}

impl RemoteProtocol {
    pub fn from_url(url: &str) -> RemoteProtocol {
        if url.starts_with("https://") || url.starts_with("http://") {
            RemoteProtocol::Https
        } else if url.starts_with("ssh://") || url.starts_with("git@") {
            RemoteProtocol::Ssh
        } else if url.starts_with("file://") || Path::new(url).exists() {
            RemoteProtocol::Local
        } else {
            RemoteProtocol::Unknown
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Section {
    kind: String,
    subsection: Option<String>,
    entries: Vec<(String, String)>,
}

#[derive(Clone, Debug, Default)]
struct ConfigFile {
    sections: Vec<Section>,
}

impl ConfigFile {
    fn parse(text: &str) -> Result<ConfigFile, GyattError> {
        let mut sections: Vec<Section> = Vec::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let header = header.trim();
                let (kind, subsection) = match header.split_once(' ') {
                    Some((kind, rest)) => {
                        let sub = rest
                            .trim()
                            .strip_prefix('"')
                            .and_then(|s| s.strip_suffix('"'))
                            .ok_or_else(|| {
                                GyattError::BadFormat(format!("config section '[{header}]'"))
                            })?;
                        (kind.to_string(), Some(sub.to_string()))
                    }
                    None => (header.to_string(), None),
                };
                sections.push(Section {
                    kind,
                    subsection,
                    entries: Vec::new(),
                });
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| GyattError::BadFormat(format!("config line '{line}'")))?;
            let section = sections
                .last_mut()
                .ok_or_else(|| GyattError::BadFormat("config entry before section".to_string()))?;
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(ConfigFile { sections })
    }

    fn serialize(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            match &section.subsection {
                Some(sub) => out.push_str(&format!("[{} \"{}\"]\n", section.kind, sub)),
                None => out.push_str(&format!("[{}]\n", section.kind)),
            }
            for (key, value) in &section.entries {
                out.push_str(&format!("\t{key} = {value}\n"));
            }
        }
        out
    }

    fn section(&self, kind: &str, subsection: Option<&str>) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.kind == kind && s.subsection.as_deref() == subsection)
    }

    fn section_mut(&mut self, kind: &str, subsection: Option<&str>) -> &mut Section {
        let pos = self
            .sections
            .iter()
            .position(|s| s.kind == kind && s.subsection.as_deref() == subsection);
        match pos {
            Some(i) => &mut self.sections[i],
            None => {
                self.sections.push(Section {
                    kind: kind.to_string(),
                    subsection: subsection.map(str::to_string),
                    entries: Vec::new(),
                });
                self.sections.last_mut().unwrap()
            }
        }
    }
}

pub struct Config;

impl Config {
    fn load() -> Result<ConfigFile, GyattError> {
        let file = path::config()?;
        if !file.exists() {
            return Ok(ConfigFile::default());
        }
        ConfigFile::parse(&std::fs::read_to_string(file)?)
    }

    fn save(config: &ConfigFile) -> Result<(), GyattError> {
        util::atomic_write(&path::config()?, config.serialize().as_bytes())
    }

    pub fn get(
        configuration: &str,
        name: Option<&str>,
        key: &str,
    ) -> Result<Option<String>, GyattError> {
        let config = Config::load()?;
        Ok(config.section(configuration, name).and_then(|s| {
            s.entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }))
    }

    pub fn set(
        configuration: &str,
        name: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<(), GyattError> {
        let mut config = Config::load()?;
        let section = config.section_mut(configuration, name);
        match section.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => section.entries.push((key.to_string(), value.to_string())),
        }
        Config::save(&config)
    }

    pub fn all_remote_configs() -> Result<Vec<RemoteConfig>, GyattError> {
        let config = Config::load()?;
        Ok(config
            .sections
            .iter()
            .filter(|s| s.kind == "remote")
            .filter_map(|s| {
                let name = s.subsection.clone()?;
                let url = s
                    .entries
                    .iter()
                    .find(|(k, _)| k == "url")
                    .map(|(_, v)| v.clone())?;
                Some(RemoteConfig { name, url })
            })
            .collect())
    }

    pub fn remote_url(name: &str) -> Result<Option<String>, GyattError> {
        Config::get("remote", Some(name), "url")
    }

    pub fn add_remote(name: &str, url: &str) -> Result<(), GyattError> {
        if Config::remote_url(name)?.is_some() {
            return Err(GyattError::AlreadyExists(format!("remote '{name}'")));
        }
        Config::set("remote", Some(name), "url", url)
    }

    pub fn remove_remote(name: &str) -> Result<(), GyattError> {
        let mut config = Config::load()?;
        let before = config.sections.len();
        config
            .sections
            .retain(|s| !(s.kind == "remote" && s.subsection.as_deref() == Some(name)));
        if config.sections.len() == before {
            return Err(GyattError::NotFound(format!("remote '{name}'")));
        }
        Config::save(&config)
    }

    /// Forge token: environment variable first, then the token file. Works
    /// outside a repository too (clone needs credentials before init).
    pub fn github_token() -> Result<Option<String>, GyattError> {
        if let Ok(token) = env::var(TOKEN_ENV) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                return Ok(Some(token));
            }
        }
        let Ok(file) = path::github_token() else {
            return Ok(None);
        };
        if !file.exists() {
            return Ok(None);
        }
        let token = std::fs::read_to_string(file)?.trim().to_string();
        Ok(if token.is_empty() { None } else { Some(token) })
    }

    /// Persist the token with owner-only permissions.
    pub fn store_token(token: &str) -> Result<(), GyattError> {
        let file = path::github_token()?;
        util::atomic_write(&file, format!("{}\n", token.trim()).as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}
