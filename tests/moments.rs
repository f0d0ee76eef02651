use mc_tally::engine::moments::{self, Moments};
use mc_tally::engine::statistics::{
    figure_of_merit, mean, relative_error, relative_vov, sample_variance, ProcessedMoments,
};

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol * expected.abs().max(1.0),
        "expected {expected}, got {actual}"
    );
}

#[test]
fn identical_samples_reconstruct_power_sums() {
    let n = 1000;
    let c = 0.5;
    let mut m = Moments::ZERO;
    for _ in 0..n {
        m.add_sample(c);
    }
    let n = n as f64;
    assert_close(m.m1, n * c, 1e-12);
    assert_close(m.m2, n * c * c, 1e-12);
    assert_close(m.m3, n * c * c * c, 1e-12);
    assert_close(m.m4, n * c * c * c * c, 1e-12);
}

#[test]
fn negative_samples_keep_even_moments_positive() {
    let mut m = Moments::ZERO;
    m.add_sample(-2.0);
    assert_eq!(m, Moments { m1: -2.0, m2: 4.0, m3: -8.0, m4: 16.0 });
}

#[test]
fn with_sample_refuses_overflow() {
    let m = Moments::ZERO;
    assert!(m.with_sample(1e100).is_none());
    assert!(m.with_sample(f64::NAN).is_none());
    assert_eq!(m.with_sample(3.0), Some(Moments { m1: 3.0, m2: 9.0, m3: 27.0, m4: 81.0 }));
    assert!(m.is_zero());
}

#[test]
fn combining_is_addition() {
    let mut a = Moments::ZERO;
    a.add_sample(1.0);
    let mut b = Moments::ZERO;
    b.add_sample(2.0);

    let mut both = Moments::ZERO;
    both.add_sample(1.0);
    both.add_sample(2.0);

    assert_eq!(a + b, both);

    let mut dst = vec![a, Moments::ZERO];
    moments::combine_all(&mut dst, &[b, b]);
    assert_eq!(dst, vec![both, b]);

    moments::reset_all(&mut dst);
    assert!(dst.iter().all(Moments::is_zero));
}

#[test]
fn reference_moments_process_to_known_statistics() {
    let m = Moments { m1: 10.0, m2: 100.0, m3: 1000.0, m4: 10000.0 };
    let n = 100;

    assert_close(mean(m.m1, n), 0.1, 1e-12);
    assert_close(sample_variance(m.m1, m.m2, n), 1.0, 1e-12);
    assert_close(relative_error(m.m1, m.m2, n), 1.0, 1e-12);
    assert_close(relative_vov(&m, n), 0.97010101010101, 1e-12);
    assert_close(figure_of_merit(2.0, 1e3), 2.5e-4, 1e-12);

    let p = ProcessedMoments::process(&m, n, 4.0, 2.0, 10.0);
    assert_close(p.mean, 0.05, 1e-12);
    assert_close(p.relative_error, 1.0, 1e-12);
    assert_close(p.variance_of_variance, 0.97010101010101, 1e-12);
    assert_close(p.figure_of_merit, 0.1, 1e-12);
}

#[test]
fn degenerate_inputs_yield_zero() {
    assert_eq!(mean(5.0, 0), 0.0);
    assert_eq!(sample_variance(5.0, 25.0, 1), 0.0);
    assert_eq!(relative_error(0.0, 0.0, 10), 0.0);
    assert_eq!(relative_error(5.0, 25.0, 1), 0.0);
    assert_eq!(figure_of_merit(0.0, 10.0), 0.0);
    assert_eq!(figure_of_merit(0.5, 0.0), 0.0);

    // Four identical samples: zero spread.
    let mut m = Moments::ZERO;
    for _ in 0..4 {
        m.add_sample(0.5);
    }
    assert_eq!(relative_vov(&m, 4), 0.0);
    assert_eq!(relative_error(m.m1, m.m2, 4), 0.0);
    assert_eq!(relative_vov(&Moments::ZERO, 0), 0.0);

    assert_eq!(
        ProcessedMoments::process(&Moments::ZERO, 0, 1.0, 1.0, 1.0),
        ProcessedMoments::default()
    );
}
