use assert_approx_eq::assert_approx_eq;
use ensemble_forecast::metrics::{accuracy, mean_absolute_error, mean_squared_error, Scoring};

#[test]
fn test_accuracy_counts_exact_matches() {
    let predicted = vec![1.0, -1.0, 0.0, 1.0];
    let actual = vec![1.0, 1.0, 0.0, 1.0];

    assert_approx_eq!(accuracy(&predicted, &actual).unwrap(), 0.75);
}

#[test]
fn test_mean_squared_error() {
    let predicted = vec![1.0, 2.0, 3.0];
    let actual = vec![2.0, 2.0, 5.0];

    // (1 + 0 + 4) / 3
    assert_approx_eq!(mean_squared_error(&predicted, &actual).unwrap(), 5.0 / 3.0);
}

#[test]
fn test_mean_absolute_error() {
    let predicted = vec![1.0, 2.0, 3.0];
    let actual = vec![2.0, 2.0, 5.0];

    assert_approx_eq!(mean_absolute_error(&predicted, &actual).unwrap(), 1.0);
}

#[test]
fn test_scoring_is_oriented_higher_is_better() {
    let perfect = vec![1.0, -1.0];
    let wrong = vec![-1.0, 1.0];
    let actual = vec![1.0, -1.0];

    for scoring in [
        Scoring::Accuracy,
        Scoring::NegMeanSquaredError,
        Scoring::NegMeanAbsoluteError,
    ] {
        let good = scoring.compute(&perfect, &actual).unwrap();
        let bad = scoring.compute(&wrong, &actual).unwrap();
        assert!(good > bad, "{} should rank the perfect forecast higher", scoring);
    }
}

#[test]
fn test_mismatched_lengths_are_rejected() {
    assert!(accuracy(&[1.0], &[1.0, 2.0]).is_err());
    assert!(mean_squared_error(&[], &[]).is_err());
}
