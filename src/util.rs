/// Arithmetic mean; `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation; `None` for an empty slice.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance =
        data.iter().map(|v| (m - v) * (m - v)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[100., 200., 300.]), Some(200.0));
        assert_eq!(mean(&[180., 220.]), Some(200.0));
    }

    #[test]
    fn test_mean_single_value() {
        assert_eq!(mean(&[250.0]), Some(250.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[200., 200., 200.]), Some(0.0));
        let sd = std_dev(&[150., 250.]).unwrap();
        assert!((sd - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_std_dev_single_value() {
        assert_eq!(std_dev(&[42.0]), Some(0.0));
    }

    #[test]
    fn test_std_dev_empty_slice() {
        assert_eq!(std_dev(&[]), None);
    }
}
