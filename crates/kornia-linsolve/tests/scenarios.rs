use approx::assert_relative_eq;
use kornia_linsolve::{
    iterative, lu, qr, svd, IterativeConfig, LinearSolver, LinearSolverStatus, LuSolver,
    QrSolver, SolverError, SvdSolver,
};
use kornia_matrix::Matrix;
use rand::{rngs::StdRng, SeedableRng};

fn assert_close(actual: &Matrix<f64>, expected: &Matrix<f64>, epsilon: f64) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.to_vec().iter().zip(expected.to_vec()) {
        assert_relative_eq!(*a, e, epsilon = epsilon, max_relative = epsilon);
    }
}

fn lu_demo_system() -> Result<(Matrix<f64>, Matrix<f64>, Matrix<f64>), SolverError> {
    let a = Matrix::from_rows(&[
        [2.0, -3.0, 5.0, 1.0, 8.0, 2.0],
        [-4.0, 7.0, -14.0, 0.0, 4.0, 3.0],
        [6.0, -10.0, 15.0, 2.0, 1.0, 1.0],
        [2.0, 1.0, 1.0, 4.0, 0.0, 4.0],
        [1.0, -7.0, 4.0, 0.0, 4.0, 2.0],
        [12.0, -1.0, -1.0, 4.0, 0.0, 4.0],
    ]);
    let x = Matrix::from_fn(6, 5, |i, j| (i as f64 + 1.0) - 0.5 * j as f64);
    let b = a.matmul(&x)?;
    Ok((a, b, x))
}

#[test]
fn lu_instance_and_static_agree() -> Result<(), SolverError> {
    let (a, b, x) = lu_demo_system()?;

    let mut solver = LuSolver::new(&a)?;
    assert_eq!(solver.status(), LinearSolverStatus::RegularMatrix);
    let instance = solver.solve(&b)?;
    let one_shot = lu::solve(&a, &b)?;

    assert_eq!(instance.solution, one_shot.solution);
    assert_close(&instance.solution, &x, 1e-10);

    // the in-place form overwrites its input with the factors
    let mut scratch = a.clone();
    let destructive = lu::solve_in_place(&mut scratch, &b)?;
    assert_eq!(destructive.solution, one_shot.solution);
    assert_ne!(scratch, a);
    Ok(())
}

#[test]
fn random_round_trip() -> Result<(), SolverError> {
    let mut rng = StdRng::seed_from_u64(42);
    let n = 20;
    // diagonal shift keeps the condition number small
    let mut a = Matrix::<f64>::random_with_rng(&mut rng, n, n, -1.0, 1.0);
    for i in 0..n {
        a[(i, i)] += n as f64;
    }
    let b = Matrix::<f64>::random_with_rng(&mut rng, n, 3, -10.0, 10.0);

    for x in [
        lu::solve(&a, &b)?.solution,
        qr::solve(&a, &b)?.solution,
        svd::solve(&a, &b)?.solution,
    ] {
        assert_close(&a.matmul(&x)?, &b, 1e-9);
    }
    Ok(())
}

#[test]
fn qr_least_squares_normal_equations() -> Result<(), SolverError> {
    let mut rng = StdRng::seed_from_u64(7);
    let a = Matrix::<f64>::random_with_rng(&mut rng, 12, 4, -2.0, 2.0);
    let b = Matrix::<f64>::random_with_rng(&mut rng, 12, 2, -2.0, 2.0);

    let record = QrSolver::new(&a)?.solve(&b)?;
    let residual = a.matmul(&record.solution)?.sub(&b)?;
    let gradient = a.transposition().matmul(&residual)?;
    assert!(gradient.norm_inf() < 1e-10);

    // the SVD least squares solution is the same for a full rank matrix
    assert_close(&svd::solve(&a, &b)?.solution, &record.solution, 1e-9);
    Ok(())
}

#[test]
fn svd_solution_orthogonal_to_null_space() -> Result<(), SolverError> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut a = Matrix::<f64>::random_with_rng(&mut rng, 8, 4, -1.0, 1.0);
    // duplicate column 0 into column 3: (1, 0, 0, -1) spans the null space
    for i in 0..8 {
        a[(i, 3)] = a[(i, 0)];
    }
    let b = Matrix::<f64>::random_with_rng(&mut rng, 8, 1, -1.0, 1.0);

    // the default threshold zeroes the rounding left in the null direction
    let mut solver = SvdSolver::new(&a)?;
    assert!(solver.singular_values()[3] <= solver.threshold());
    assert_eq!(solver.rank(), 3);
    assert_eq!(solver.status(), LinearSolverStatus::SingularMatrix);
    let record = solver.solve(&b)?;
    assert_eq!(record.status, LinearSolverStatus::SingularMatrix);

    let x = record.solution;
    assert!((x[(0, 0)] - x[(3, 0)]).abs() < 1e-10);

    // still optimal in the least squares sense
    let gradient = a.transposition().matmul(&a.matmul(&x)?.sub(&b)?)?;
    assert!(gradient.norm_inf() < 1e-10);
    Ok(())
}

#[test]
fn singular_lu_refuses_to_solve() -> Result<(), SolverError> {
    let a = Matrix::from_rows(&[[1.0, 2.0, 3.0], [0.0, 0.0, 0.0], [4.0, 5.0, 6.0]]);
    let b = Matrix::from_rows(&[[1.0], [1.0], [1.0]]);

    let mut solver = LuSolver::new(&a)?;
    assert_eq!(solver.status(), LinearSolverStatus::SingularMatrix);
    assert_eq!(solver.solve(&b).err(), Some(SolverError::SingularMatrix));
    assert_eq!(lu::solve(&a, &b).err(), Some(SolverError::SingularMatrix));
    Ok(())
}

#[test]
fn stationary_methods_match_lu() -> Result<(), SolverError> {
    let mut rng = StdRng::seed_from_u64(5);
    let n = 10;
    let mut a = Matrix::<f64>::random_with_rng(&mut rng, n, n, -1.0, 1.0);
    for i in 0..n {
        // strictly diagonally dominant
        let off: f64 = a.row(i).iter().map(|x| x.abs()).sum();
        a[(i, i)] = off + 1.0;
    }
    let b = Matrix::<f64>::random_with_rng(&mut rng, n, 2, -5.0, 5.0);
    let x_lu = lu::solve(&a, &b)?.solution;

    let config = IterativeConfig::default();
    for record in [
        iterative::jacobi(&a, &b, config)?,
        iterative::gauss_seidel(&a, &b, config)?,
        iterative::sor(&a, &b, 1.05, config)?,
    ] {
        assert_eq!(record.status, LinearSolverStatus::Succeeded);
        assert_close(&record.solution, &x_lu, 1e-8);
    }

    let diverging = Matrix::from_rows(&[[1.0, 3.0], [3.0, 1.0]]);
    let rhs = Matrix::from_rows(&[[1.0], [1.0]]);
    let record = iterative::gauss_seidel(&diverging, &rhs, config)?;
    assert_eq!(record.status, LinearSolverStatus::Failed);
    Ok(())
}

#[test]
fn solvers_behind_trait_objects() -> Result<(), SolverError> {
    let (a, b, x) = lu_demo_system()?;
    let mut solvers: Vec<Box<dyn LinearSolver<f64>>> = vec![
        Box::new(LuSolver::new(&a)?),
        Box::new(QrSolver::new(&a)?),
        Box::new(SvdSolver::new(&a)?),
    ];
    for solver in solvers.iter_mut() {
        assert_eq!((solver.nrows(), solver.ncols()), (6, 6));
        assert_close(&solver.solve(&b)?.solution, &x, 1e-8);
    }
    Ok(())
}
