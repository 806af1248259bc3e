//! Node list validation logic.

use std::collections::HashSet;

use crate::error::{NetworkError, NetworkResult};
use crate::node::GROUND_NAME;

/// Names must be non-empty, unique, and must not shadow ground.
pub(crate) fn validate_names(names: &[String]) -> NetworkResult<()> {
    let mut seen = HashSet::new();
    for (index, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(NetworkError::EmptyName { index });
        }
        if name.eq_ignore_ascii_case(GROUND_NAME) {
            return Err(NetworkError::ReservedName { index });
        }
        if !seen.insert(name.as_str()) {
            return Err(NetworkError::DuplicateName { name: name.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_reserved_names_fail() {
        assert_eq!(
            validate_names(&["A".into(), " ".into()]),
            Err(NetworkError::EmptyName { index: 1 })
        );
        assert_eq!(
            validate_names(&["ground".into()]),
            Err(NetworkError::ReservedName { index: 0 })
        );
        assert!(validate_names(&["A".into(), "B".into()]).is_ok());
    }
}
