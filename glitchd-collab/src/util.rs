use rand::{distributions::Alphanumeric, thread_rng, Rng};
use uuid::Uuid;

use crate::PrimaryKey;

/// Generates a random code of ASCII letters and digits
pub fn random_code(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

pub fn new_id() -> PrimaryKey {
    Uuid::new_v4().to_string()
}

/// Returns the part of an email address before the @, if the address looks valid
pub fn email_local_part(email: &str) -> Option<&str> {
    let (local, domain) = email.split_once('@')?;

    if local.is_empty() || domain.is_empty() {
        return None;
    }

    Some(local)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_random_code_is_alphanumeric() {
        let code = random_code(6);

        assert_eq!(code.len(), 6);
        assert!(
            code.chars().all(|c| c.is_ascii_alphanumeric()),
            "code {code} should only contain letters and digits"
        );
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("a@b.com"), Some("a"));
        assert_eq!(email_local_part("nobody"), None);
        assert_eq!(email_local_part("@b.com"), None);
        assert_eq!(email_local_part("a@"), None);
    }
}
