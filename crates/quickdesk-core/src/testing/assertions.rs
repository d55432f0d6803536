//! Assertion macros for desk results.

/// Assert that a result is Ok.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: {}: expected Ok, got Err({:?})", format_args!($($arg)+), e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: expected Err, got Ok({:?})", v),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: {}: expected Err, got Ok({:?})", format_args!($($arg)+), v),
        }
    };
}

/// Assert that an error matches a pattern.
///
/// ```ignore
/// assert_err_variant!(result, DeskError::Forbidden { .. });
/// ```
#[macro_export]
macro_rules! assert_err_variant {
    ($expr:expr, $variant:pat) => {
        match &$expr {
            Err($variant) => (),
            Err(e) => panic!(
                "assertion failed: expected {}, got {:?}",
                stringify!($variant),
                e
            ),
            Ok(v) => panic!(
                "assertion failed: expected Err({}), got Ok({:?})",
                stringify!($variant),
                v
            ),
        }
    };
}

/// Assert that a denial redirected to the ticket list.
#[macro_export]
macro_rules! assert_redirected {
    ($expr:expr) => {
        match &$expr {
            Err($crate::DeskError::Forbidden {
                redirect_to: Some(to),
                ..
            }) => assert_eq!(to, $crate::access::DENIED_REDIRECT),
            other => panic!("assertion failed: expected redirect, got {:?}", other),
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::error::DeskError;

    #[test]
    fn test_assert_ok() {
        let result: Result<i32, DeskError> = Ok(1);
        assert_ok!(result);
        assert_ok!(result, "with message {}", 1);
    }

    #[test]
    fn test_assert_err_variant() {
        let result: Result<(), DeskError> = Err(DeskError::NotFound("ticket".into()));
        assert_err!(result);
        assert_err_variant!(result, DeskError::NotFound(_));
    }

    #[test]
    fn test_assert_redirected() {
        let result: Result<(), DeskError> = Err(DeskError::Forbidden {
            message: "no".into(),
            redirect_to: Some("/tickets".into()),
        });
        assert_redirected!(result);
    }

    #[test]
    #[should_panic(expected = "expected Ok")]
    fn test_assert_ok_panics() {
        let result: Result<(), DeskError> = Err(DeskError::Internal("x".into()));
        assert_ok!(result);
    }
}
