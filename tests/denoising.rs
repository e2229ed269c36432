use approx::assert_abs_diff_eq;
use mixdenoise::patches::{MergeMethod, OverlappingPatches, psnr};
use mixdenoise::{
    AnyModel, CsrPosteriors, DenoiseConfig, DenoiseError, DenoisingDriver, DiagonalModel,
    DiagonalReconstructor, FullModel, FullReconstructor, MfaModel, MfaReconstructor, Posterior,
    PosteriorStore, Reconstructor, denoise,
};
use ndarray::{Array1, Array2, Array3, array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_matrix(rng: &mut StdRng, shape: (usize, usize)) -> Array2<f64> {
    let normal = Normal::new(0.0, 1.0).expect("normal");
    Array2::from_shape_fn(shape, |_| normal.sample(rng))
}

fn random_mfa(rng: &mut StdRng, c: usize, d: usize, h: usize) -> MfaModel {
    let means = random_matrix(rng, (c, d));
    let normal = Normal::new(0.0, 0.5).expect("normal");
    let uv = Array3::from_shape_fn((c, d, d + h), |_| normal.sample(rng));
    let a = random_matrix(rng, (c, d * h));
    MfaModel::new(means, uv, a, h).expect("mfa model")
}

/// Sparse random posteriors with 0..=max_entries distinct components each,
/// listed in a shuffled order.
fn random_posteriors(rng: &mut StdRng, n: usize, c: usize, max_entries: usize) -> Vec<Posterior> {
    let weight = Uniform::new(0.01, 1.0);
    (0..n)
        .map(|_| {
            let count = rng.gen_range(0..=max_entries.min(c));
            let mut components: Vec<usize> = (0..c).collect();
            for i in 0..count {
                let j = rng.gen_range(i..c);
                components.swap(i, j);
            }
            let pairs: Vec<(usize, f64)> = components[..count]
                .iter()
                .map(|&component| (component, weight.sample(rng)))
                .collect();
            Posterior::from_pairs(pairs).expect("posterior")
        })
        .collect()
}

/// Σ_c q[c] · reconstruct(c, x), computed one isolated component at a time.
fn manual_mixture<R: Reconstructor>(
    reco: &R,
    x: &Array2<f64>,
    posteriors: &[Posterior],
) -> Array2<f64> {
    let mut scratch = reco.allocate_scratch();
    let mut expected = Array2::zeros(x.raw_dim());
    for (n, mut row) in expected.outer_iter_mut().enumerate() {
        for (component, probability) in posteriors.posterior(n).iter() {
            let estimate = reco.reconstruct_component(x.row(n), component, &mut scratch);
            row.scaled_add(probability, &estimate);
        }
    }
    expected
}

#[test]
fn worked_mfa_example_gives_five_zero() {
    init_logging();
    let means = array![[1.0, 0.0]];
    let mut uv = Array3::zeros((1, 2, 3));
    uv[[0, 0, 2]] = 1.0;
    let a = array![[2.0, 0.0]];
    let mut model = MfaModel::new(means, uv, a, 1).expect("model");
    let mut reco = MfaReconstructor::new(&mut model).expect("reconstructor");

    let q = vec![Posterior::from_pairs([(0, 1.0)]).expect("posterior")];
    let out = denoise(array![[3.0, 0.0]].view(), &mut reco, &q).expect("denoise");
    assert_abs_diff_eq!(out[[0, 0]], 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(out[[0, 1]], 0.0, epsilon = 1e-12);
}

#[test]
fn two_component_mfa_mixes_isolated_reconstructions() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(11);
    let mut model = random_mfa(&mut rng, 2, 4, 2);
    let mut reco = MfaReconstructor::new(&mut model).expect("reconstructor");
    let x = random_matrix(&mut rng, (1, 4));
    let q = vec![Posterior::from_pairs([(0, 0.3), (1, 0.7)]).expect("posterior")];

    let mut scratch = reco.allocate_scratch();
    let first = reco.reconstruct_component(x.row(0), 0, &mut scratch);
    let second = reco.reconstruct_component(x.row(0), 1, &mut scratch);
    let expected: Array1<f64> = 0.3 * &first + 0.7 * &second;

    let out = denoise(x.view(), &mut reco, &q).expect("denoise");
    for j in 0..4 {
        assert_abs_diff_eq!(out[[0, j]], expected[j], epsilon = 1e-12);
    }
}

#[test]
fn random_mfa_pass_matches_manual_sum() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(2024);
    let (n, c, d, h) = (200, 6, 9, 3);
    let mut model = random_mfa(&mut rng, c, d, h);
    let x = random_matrix(&mut rng, (n, d));
    let q = random_posteriors(&mut rng, n, c, 4);

    let mut reco = MfaReconstructor::new(&mut model).expect("reconstructor");
    let out = DenoisingDriver::with_threads(3)
        .denoise(x.view(), &mut reco, &q)
        .expect("denoise");
    let expected = manual_mixture(&reco, &x, &q);

    for ((i, j), &value) in out.indexed_iter() {
        assert_abs_diff_eq!(value, expected[[i, j]], epsilon = 1e-10);
    }
    for (sample, posterior) in q.iter().enumerate() {
        if posterior.is_empty() {
            assert!(out.row(sample).iter().all(|&v| v == 0.0));
        }
    }
}

#[test]
fn results_are_bit_identical_across_worker_counts() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(7);
    let (n, c, d, h) = (333, 8, 12, 4);
    let mut model = random_mfa(&mut rng, c, d, h);
    let x = random_matrix(&mut rng, (n, d));
    let q = CsrPosteriors::from_posteriors(&random_posteriors(&mut rng, n, c, 5));

    let mut reco = MfaReconstructor::new(&mut model).expect("reconstructor");
    let single = DenoisingDriver::with_threads(1)
        .denoise(x.view(), &mut reco, &q)
        .expect("single worker");
    for threads in [2, 5, 16] {
        let many = DenoisingDriver::with_threads(threads)
            .denoise(x.view(), &mut reco, &q)
            .expect("many workers");
        assert_eq!(single, many, "{threads} workers");
    }
    let again = DenoisingDriver::with_threads(1)
        .denoise(x.view(), &mut reco, &q)
        .expect("repeat");
    assert_eq!(single, again);
}

#[test]
fn diagonal_and_full_agree() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(3);
    let (n, c, d) = (64, 5, 7);
    let means = random_matrix(&mut rng, (c, d));
    let x = random_matrix(&mut rng, (n, d));
    let q = random_posteriors(&mut rng, n, c, 3);

    let mut diagonal = DiagonalModel::from_means(means.clone());
    let mut full = FullModel::from_means(means);
    let from_diagonal = denoise(
        x.view(),
        &mut DiagonalReconstructor::new(&mut diagonal).expect("diagonal"),
        &q,
    )
    .expect("diagonal pass");
    let from_full = denoise(
        x.view(),
        &mut FullReconstructor::new(&mut full).expect("full"),
        &q,
    )
    .expect("full pass");
    assert_eq!(from_diagonal, from_full);
}

#[test]
fn mfa_without_latent_factors_matches_mean_reconstruction() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(5);
    let (n, c, d) = (40, 3, 6);
    let means = random_matrix(&mut rng, (c, d));
    let x = random_matrix(&mut rng, (n, d));
    let q = random_posteriors(&mut rng, n, c, 3);

    let uv = random_matrix(&mut rng, (c * d, d))
        .into_shape_with_order((c, d, d))
        .expect("uv blocks");
    let mut mfa = MfaModel::new(means.clone(), uv, Array2::zeros((c, 0)), 0).expect("mfa");
    let mut diagonal = DiagonalModel::from_means(means);

    let from_mfa = denoise(
        x.view(),
        &mut MfaReconstructor::new(&mut mfa).expect("mfa"),
        &q,
    )
    .expect("mfa pass");
    let from_diagonal = denoise(
        x.view(),
        &mut DiagonalReconstructor::new(&mut diagonal).expect("diagonal"),
        &q,
    )
    .expect("diagonal pass");
    assert_eq!(from_mfa, from_diagonal);
}

#[test]
fn invalid_component_fails_before_any_write() {
    init_logging();
    let mut model = DiagonalModel::from_means(array![[1.0], [2.0]]);
    let mut reco = DiagonalReconstructor::new(&mut model).expect("reconstructor");
    let x = Array2::zeros((3, 1));
    let mut csr = CsrPosteriors::new();
    csr.push_sample([(0, 1.0)]).expect("sample 0");
    csr.push_sample([(1, 0.5), (0, 0.5)]).expect("sample 1");
    csr.push_sample([(2, 1.0)]).expect("sample 2");

    let mut out = Array2::from_elem((3, 1), 42.0);
    let err = DenoisingDriver::with_threads(2)
        .denoise_into(x.view(), out.view_mut(), &mut reco, &csr)
        .expect_err("component 2 is out of range");
    assert!(matches!(
        err,
        DenoiseError::InvalidComponent {
            sample: 2,
            component: 2,
            n_components: 2
        }
    ));
    assert!(out.iter().all(|&v| v == 42.0));
}

#[test]
fn mismatched_model_is_rejected_at_binding() {
    let mut model = MfaModel::new(
        array![[0.0, 0.0]],
        Array3::zeros((1, 2, 3)),
        array![[1.0, 1.0]],
        1,
    )
    .expect("model");
    model.a = Array2::zeros((1, 5));
    assert!(matches!(
        MfaReconstructor::new(&mut model),
        Err(DenoiseError::InvalidModel(_))
    ));
}

#[test]
fn config_selected_model_denoises_image_patches() {
    init_logging();
    let config = DenoiseConfig::from_toml_str(
        r#"
        threads = 2
        merge = "median"

        [patches]
        height = 3
        width = 3
        shift = 1
        "#,
    )
    .expect("config");

    // A flat clean image; the fitted model has a single flat component.
    let clean = Array3::from_elem((10, 9, 1), 120.0);
    let mut rng = StdRng::seed_from_u64(99);
    let noise = Normal::new(0.0, 15.0).expect("normal");
    let noisy = clean.mapv(|v| v + noise.sample(&mut rng));

    let layout = OverlappingPatches::from_config(noisy.dim(), &config.patches).expect("layout");
    let patches = layout.extract(noisy.view()).expect("extract");
    let d = layout.patch_dim();

    let mut model = AnyModel::Diagonal(DiagonalModel::from_means(Array2::from_elem((1, d), 120.0)));
    let responsibilities = Array2::ones((layout.n_patches(), 1));
    let q = CsrPosteriors::from_dense_top_k(responsibilities.view(), 1).expect("posteriors");

    let mut reco = model.reconstructor().expect("reconstructor");
    let reconstructed = DenoisingDriver::from_config(&config)
        .denoise(patches.view(), &mut reco, &q)
        .expect("denoise");
    let denoised = layout
        .merge(reconstructed.view(), config.merge)
        .expect("merge");

    let before = psnr(&clean, &noisy, 255.0).expect("psnr before");
    let after = psnr(&clean, &denoised, 255.0).expect("psnr after");
    assert!(before.is_finite());
    assert_eq!(after, f64::INFINITY);
    assert_eq!(config.merge, MergeMethod::Median);
}
