/// Nearest-rank percentile of a sorted slice, `p` in 0..=100.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
	let n = sorted_values.len();
	if n == 0 {
		return None;
	}
	let rank = ((p / 100.0) * n as f64).ceil() as usize;
	Some(sorted_values[rank.clamp(1, n) - 1])
}

pub fn mean(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		None
	} else {
		Some(values.iter().sum::<f64>() / values.len() as f64)
	}
}

/// Median of a sorted slice, averaging the two middle values for even lengths.
pub fn median(sorted_values: &[f64]) -> Option<f64> {
	let n = sorted_values.len();
	if n == 0 {
		return None;
	}
	if n % 2 == 1 {
		Some(sorted_values[n / 2])
	} else {
		Some((sorted_values[n / 2 - 1] + sorted_values[n / 2]) / 2.0)
	}
}

/// Sample standard deviation (n - 1 denominator).
///
/// Needs at least two values.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
	if values.len() < 2 {
		return None;
	}
	let avg = mean(values)?;
	let variance = values.iter()
		.map(|v| (v - avg).powi(2))
		.sum::<f64>() / (values.len() - 1) as f64;
	Some(variance.sqrt())
}

/// Sort latencies in place, treating incomparable values as equal.
pub fn sort_values(values: &mut [f64]) {
	values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_percentile_nearest_rank() {
		let values: Vec<f64> = (1..=10).map(f64::from).collect();
		assert_eq!(percentile(&values, 50.0), Some(5.0));
		assert_eq!(percentile(&values, 95.0), Some(10.0));
		assert_eq!(percentile(&values, 0.0), Some(1.0));
		assert_eq!(percentile(&[0.042], 95.0), Some(0.042));
		assert_eq!(percentile(&[], 95.0), None);
	}

	#[test]
	fn test_mean_of_latencies() {
		assert_eq!(mean(&[0.5, 1.5, 4.0]), Some(2.0));
		assert_eq!(mean(&[]), None);
	}

	#[test]
	fn test_median_odd_and_even() {
		assert_eq!(median(&[1.0, 3.0, 9.0]), Some(3.0));
		assert_eq!(median(&[1.0, 3.0, 5.0, 9.0]), Some(4.0));
		assert_eq!(median(&[]), None);
	}

	#[test]
	fn test_sample_stddev() {
		let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
		let sd = sample_stddev(&values).unwrap();
		// Sum of squared deviations is 32, over n - 1 = 7
		assert!((sd - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
	}

	#[test]
	fn test_sample_stddev_needs_two_values() {
		assert_eq!(sample_stddev(&[0.5]), None);
	}

	#[test]
	fn test_sort_values() {
		let mut values = vec![0.3, 0.1, 0.2];
		sort_values(&mut values);
		assert_eq!(values, vec![0.1, 0.2, 0.3]);
	}
}
