use serde::Serialize;
use std::fmt;
use crate::store::{EncryptionTarget, SseAttribute};

/// Server-side encryption state of one object.
///
/// `Unknown` means the attribute was never read (or the read failed);
/// `None` means it was read and the object carries no encryption attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "algorithm", rename_all = "snake_case")]
pub enum Encryption {
    Unknown,
    None,
    Target(String),
    Other(String),
}

impl Encryption {
    /// Classifies an attribute read from the store against the required target.
    /// A KMS object under the wrong key is `Other`, labelled with that key.
    pub fn classify(attribute: Option<&SseAttribute>, target: &EncryptionTarget) -> Self {
        match attribute {
            None => Encryption::None,
            Some(observed) if target.is_satisfied_by(observed) => {
                Encryption::Target(observed.algorithm.clone())
            }
            Some(observed) if observed.algorithm == target.algorithm => {
                Encryption::Other(observed.to_string())
            }
            Some(observed) => Encryption::Other(observed.algorithm.clone()),
        }
    }

    pub fn is_compliant(&self) -> bool {
        matches!(self, Encryption::Target(_))
    }

    /// Records that enrichment classified as `None` or `Other` are the only ones remediation accepts.
    pub fn needs_remediation(&self) -> bool {
        matches!(self, Encryption::None | Encryption::Other(_))
    }

    /// Whether moving from `self` to `next` respects the forward-only ordering
    /// `Unknown -> {None | Target | Other} -> Target`.
    pub fn can_transition_to(&self, next: &Encryption) -> bool {
        match (self, next) {
            (Encryption::Unknown, Encryption::Unknown) => false,
            (Encryption::Unknown, _) => true,
            (Encryption::None | Encryption::Other(_), Encryption::Target(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Encryption::Unknown => "????",
            Encryption::None => "NONE",
            Encryption::Target(a) | Encryption::Other(a) => a,
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aes() -> EncryptionTarget {
        EncryptionTarget::new("AES256")
    }

    #[test]
    fn test_classify_absent_is_none() {
        assert_eq!(Encryption::classify(None, &aes()), Encryption::None);
    }

    #[test]
    fn test_classify_target() {
        let observed = SseAttribute::new("AES256");
        assert_eq!(Encryption::classify(Some(&observed), &aes()), Encryption::Target("AES256".into()));
    }

    #[test]
    fn test_classify_other_algorithm() {
        let enc = Encryption::classify(Some(&SseAttribute::new("aws:kms")), &aes());
        assert_eq!(enc, Encryption::Other("aws:kms".into()));
        assert!(enc.needs_remediation());
        assert!(!enc.is_compliant());
    }

    #[test]
    fn test_classify_wrong_kms_key() {
        let target = EncryptionTarget::new("aws:kms").with_kms_key("arn:aws:kms:us-east-1:1:key/wanted");
        let observed = SseAttribute::new("aws:kms").with_kms_key("arn:aws:kms:us-east-1:1:key/stale");

        let enc = Encryption::classify(Some(&observed), &target);
        assert_eq!(enc, Encryption::Other("aws:kms key=arn:aws:kms:us-east-1:1:key/stale".into()));
        assert!(enc.needs_remediation());
    }

    #[test]
    fn test_unknown_never_needs_remediation() {
        assert!(!Encryption::Unknown.needs_remediation());
        assert!(!Encryption::Unknown.is_compliant());
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let target = Encryption::Target("AES256".into());
        assert!(Encryption::Unknown.can_transition_to(&Encryption::None));
        assert!(Encryption::None.can_transition_to(&target));
        assert!(Encryption::Other("aws:kms".into()).can_transition_to(&target));
        assert!(!target.can_transition_to(&Encryption::None));
        assert!(!target.can_transition_to(&Encryption::Other("aws:kms".into())));
        assert!(!Encryption::None.can_transition_to(&Encryption::Unknown));
    }

    #[test]
    fn test_display_matches_log_vocabulary() {
        assert_eq!(Encryption::Unknown.to_string(), "????");
        assert_eq!(Encryption::None.to_string(), "NONE");
        assert_eq!(Encryption::Target("AES256".into()).to_string(), "AES256");
    }
}
