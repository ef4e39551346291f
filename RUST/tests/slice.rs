use amrtui::*;

/// Value encodes its own (i, j, k) index.
fn coded(dims: &[usize]) -> Field {
    Field::from_fn(dims, |i, j, k| (i * 10_000 + j * 100 + k) as f64).unwrap()
}

#[test]
fn slice_shape_drops_the_cut_axis() {
    let f = coded(&[4, 5, 6]);
    assert_eq!(extract(&f, Axis::X, 0).unwrap().shape(), [5, 6]);
    assert_eq!(extract(&f, Axis::Y, 0).unwrap().shape(), [4, 6]);
    assert_eq!(extract(&f, Axis::Z, 0).unwrap().shape(), [4, 5]);
}

#[test]
fn slice_values_come_from_the_right_cells() {
    let f = coded(&[4, 5, 6]);

    let s = extract(&f, Axis::Z, 3).unwrap();
    assert_eq!(s.get(2, 4), Some(20_403.0));

    let s = extract(&f, Axis::Y, 1).unwrap();
    assert_eq!(s.get(3, 5), Some(30_105.0));

    let s = extract(&f, Axis::X, 2).unwrap();
    assert_eq!(s.get(0, 0), Some(20_000.0));
    assert_eq!(s.row(4).unwrap().len(), 6);
    assert_eq!(s.get(4, 6), None);
}

#[test]
fn coord_past_the_axis_is_an_error() {
    let f = coded(&[4, 5, 6]);
    let err = extract(&f, Axis::Y, 5).unwrap_err();
    assert!(!err.is_load_error());
    match err {
        BrowseError::AxisOutOfRange { axis, coord, len } => {
            assert_eq!((axis, coord, len), (1, 5, 5));
        }
        other => panic!("expected AxisOutOfRange, got {other:?}"),
    }
}

#[test]
fn two_dimensional_grids_pad_to_rank_three() {
    assert_eq!(padded_dims(&[20, 20]).unwrap(), [20, 20, 1]);
    assert_eq!(padded_dims(&[7]).unwrap(), [7, 1, 1]);
    assert!(padded_dims(&[]).is_err());
    assert!(padded_dims(&[1, 2, 3, 4]).is_err());

    let f = coded(&[10, 10]);
    let s = extract(&f, Axis::Z, 0).unwrap();
    assert_eq!(s.shape(), [10, 10]);
    assert_eq!(s.get(9, 9), Some(90_900.0));
    assert!(extract(&f, Axis::Z, 1).is_err());
}

#[test]
fn field_rejects_wrong_sample_count() {
    assert!(Field::new(&[2, 2, 2], vec![0.0; 7]).is_err());
    assert!(Field::new(&[2, 2, 2], vec![0.0; 8]).is_ok());
    assert!(Slice::new([3, 3], vec![0.0; 8]).is_err());
}

#[test]
fn min_max_ignores_non_finite_samples() {
    let s = Slice::new([2, 3], vec![f64::NAN, 4.0, -1.0, f64::INFINITY, 2.5, 0.0]).unwrap();
    assert_eq!(s.min_max(), Some((-1.0, 4.0)));
    assert_eq!(s.range(), DisplayRange::new(-1.0, 4.0));

    let blank = Slice::new([1, 2], vec![f64::NAN, f64::NAN]).unwrap();
    assert_eq!(blank.min_max(), None);
    assert_eq!(blank.range(), DisplayRange::new(0.0, 0.0));
}

#[test]
fn axis_indices() {
    for (i, a) in Axis::ALL.iter().enumerate() {
        assert_eq!(a.index(), i);
        assert_eq!(Axis::from_index(i).unwrap(), *a);
    }
    assert!(matches!(Axis::from_index(3), Err(BrowseError::InvalidAxis(3))));
    assert_eq!(Axis::Y.remaining(), (Axis::X, Axis::Z));
    assert_eq!(Axis::default(), Axis::Z);
}

#[test]
fn index_sampling_matches_direct_extraction() {
    let ds = load_sample("IsolatedGalaxy").unwrap();
    for id in [GridId(0), GridId(1)] {
        let field = ds.field(id).unwrap();
        for c in [0, 3] {
            let sampled = ds.sample(id, Axis::Z, c).unwrap();
            assert_eq!(sampled, extract(&field, Axis::Z, c).unwrap());
        }
    }

    let err = ds.sample(GridId(0), Axis::Y, 10_000).unwrap_err();
    assert!(matches!(err, BrowseError::AxisOutOfRange { axis: 1, .. }), "{err:?}");
    assert!(ds.sample(GridId(9_999), Axis::X, 0).is_err());
}
