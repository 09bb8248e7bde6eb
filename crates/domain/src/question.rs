use crate::name::DnsName;
use crate::record::{RecordClass, RecordType};
use std::fmt;

/// A logical DNS question: what is being asked, of which type, in which
/// class. Equality follows `DnsName` (case-insensitive over ASCII).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: DnsName,
    pub record_type: RecordType,
    pub class: RecordClass,
}

impl Question {
    pub fn new(name: DnsName, record_type: RecordType, class: RecordClass) -> Self {
        Self {
            name,
            record_type,
            class,
        }
    }

    /// The canonical cache key for this question.
    pub fn fingerprint(&self) -> QuestionFingerprint {
        QuestionFingerprint {
            name: self.name.canonical().into_boxed_str(),
            type_code: self.record_type.to_u16(),
            class_code: self.class.to_u16(),
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} {}", self.name, self.class, self.record_type)
    }
}

/// Canonicalized `(lowercased name, type, class)` used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionFingerprint {
    name: Box<str>,
    type_code: u16,
    class_code: u16,
}
