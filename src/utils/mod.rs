pub mod client_storage;
pub mod ignore;
pub mod object_ext;
pub mod path;
pub mod test;
pub mod util;
