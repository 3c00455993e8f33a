use crate::error::ValidationError;

/// Balance after an order spends `used` points and earns `earned`.
pub fn settle_points(balance: i64, used: i64, earned: i64) -> Result<i64, ValidationError> {
    if used < 0 || earned < 0 {
        return Err(ValidationError::Invalid(
            "points must be non-negative".into(),
        ));
    }
    if used > balance {
        return Err(ValidationError::Invalid(format!(
            "cannot use {used} points, only {balance} available"
        )));
    }
    Ok(balance - used + earned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spends_then_credits() {
        assert_eq!(settle_points(300, 200, 95), Ok(195));
        assert_eq!(settle_points(0, 0, 50), Ok(50));
    }

    #[test]
    fn overspending_is_rejected() {
        assert!(settle_points(100, 101, 0).is_err());
    }

    #[test]
    fn negative_points_are_rejected() {
        assert!(settle_points(100, -1, 0).is_err());
        assert!(settle_points(100, 0, -1).is_err());
    }
}
