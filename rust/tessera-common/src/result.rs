pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Fails with `InvalidArgument` naming `$name` when the predicate does not hold.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Fails with `InvalidFormat` for element `$name`: persisted data broke an
/// invariant.
#[macro_export]
macro_rules! verify_data {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_data(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Fails with `ContractViolation` when the predicate does not hold.
///
/// Used by writers and readers to reject calls made out of state-machine order.
#[macro_export]
macro_rules! verify_contract {
    ($operation:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_contract(result, $operation, stringify!($expr))?;
    }};
}

#[doc(hidden)]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    check(predicate, || crate::Error::invalid_arg(name, condition))
}

#[doc(hidden)]
pub fn verify_data(predicate: bool, name: &str, condition: &str) -> Result<()> {
    check(predicate, || crate::Error::invalid_format(name, condition))
}

#[doc(hidden)]
pub fn verify_contract(predicate: bool, operation: &str, condition: &str) -> Result<()> {
    check(predicate, || crate::Error::contract(operation, condition))
}

#[inline]
fn check(predicate: bool, error: impl FnOnce() -> crate::Error) -> Result<()> {
    if predicate { Ok(()) } else { Err(error()) }
}

#[cfg(test)]
mod tests {
    use crate::{Result, error::ErrorKind};

    fn check_len(buf: &[u8]) -> Result<usize> {
        verify_data!("buffer", buf.len() >= 4);
        Ok(buf.len())
    }

    fn check_state(prepared: bool) -> Result<()> {
        verify_contract!("writer.write", prepared);
        Ok(())
    }

    fn check_arg(size: u32) -> Result<u32> {
        verify_arg!(block_size, size >= 2);
        Ok(size)
    }

    #[test]
    fn test_verify_macros() {
        let err = check_arg(1).unwrap_err();
        assert!(err.to_string().contains("block_size"));
        assert!(err.to_string().contains("size >= 2"));

        assert_eq!(check_len(b"abcd").unwrap(), 4);
        let err = check_len(b"ab").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));

        check_state(true).unwrap();
        let err = check_state(false).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
