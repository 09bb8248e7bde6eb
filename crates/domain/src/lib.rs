pub mod errors;
pub mod message;
pub mod name;
pub mod options;
pub mod question;
pub mod record;
pub mod server;

pub use errors::ResolveError;
pub use message::{DnsResponse, Header, OpCode, ResponseCode};
pub use name::DnsName;
pub use options::ClientOptions;
pub use question::{Question, QuestionFingerprint};
pub use record::{RData, RecordClass, RecordType, ResourceRecord};
pub use server::NameServer;
