use ensemble_forecast::validation::time_series_split;
use rstest::rstest;

#[rstest]
#[case(6, 5)]
#[case(10, 3)]
#[case(23, 4)]
#[case(100, 5)]
#[case(500, 5)]
fn folds_respect_time_ordering(#[case] window_len: usize, #[case] n_splits: usize) {
    let folds = time_series_split(window_len, n_splits).unwrap();
    assert_eq!(folds.len(), n_splits);

    for fold in &folds {
        assert!(!fold.train.is_empty());
        assert!(!fold.validation.is_empty());
        // every validation index is strictly past every training index
        let max_train = fold.train.end - 1;
        assert!(fold.validation.clone().all(|v| v > max_train));
        // training is the prefix ending where validation begins
        assert_eq!(fold.train.start, 0);
        assert_eq!(fold.train.end, fold.validation.start);
    }

    // validation slices are ordered and non-overlapping
    for pair in folds.windows(2) {
        assert!(pair[0].validation.end <= pair[1].validation.start);
    }
    assert_eq!(folds.last().unwrap().validation.end, window_len);
}

#[rstest]
#[case(5, 5)]
#[case(3, 3)]
#[case(1, 1)]
#[case(0, 2)]
fn short_windows_are_rejected(#[case] window_len: usize, #[case] n_splits: usize) {
    assert!(time_series_split(window_len, n_splits).is_err());
}

#[test]
fn zero_splits_are_rejected() {
    assert!(time_series_split(50, 0).is_err());
}

#[test]
fn validation_sizes_are_equal() {
    let folds = time_series_split(60, 4).unwrap();
    let sizes: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
    assert!(sizes.iter().all(|&s| s == sizes[0]));
}
