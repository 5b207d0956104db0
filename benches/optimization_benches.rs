use RustedOptim::numerical::optimization::bfgs_b::BfgsBMinimizer;
use RustedOptim::numerical::optimization::bisection::BisectionRootFinder;
use RustedOptim::numerical::optimization::objective::SimpleObjectiveFunction;
use RustedOptim::numerical::optimization::test_problems::{
    TestObjective, rosenbrock_gradient, rosenbrock_value,
};
use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::DVector;
use std::hint::black_box;

fn bench_rosenbrock_bfgs_b(c: &mut Criterion) {
    let solver = BfgsBMinimizer::new(1e-5, 1e-5, 1e-5, 1000);
    let objective = SimpleObjectiveFunction::new(rosenbrock_value, rosenbrock_gradient);
    let lower = DVector::from_vec(vec![-5.0, -5.0]);
    let upper = DVector::from_vec(vec![5.0, 5.0]);
    let start = DVector::from_vec(vec![-1.2, 1.0]);
    c.bench_function("BFGS-B Rosenbrock", |b| {
        b.iter(|| solver.find_minimum(&objective, &lower, &upper, black_box(&start)))
    });
}

fn bench_rosenbrock_hessian_seeded(c: &mut Criterion) {
    let solver = BfgsBMinimizer::new(1e-5, 1e-5, 1e-5, 1000);
    let problem = TestObjective::Rosenbrock;
    let lower = DVector::from_vec(vec![-5.0, -5.0]);
    let upper = DVector::from_vec(vec![5.0, 5.0]);
    let start = DVector::from_vec(vec![-1.2, 1.0]);
    c.bench_function("BFGS-B Rosenbrock, Hessian seeded", |b| {
        b.iter(|| solver.find_minimum(&problem, &lower, &upper, black_box(&start)))
    });
}

fn bench_bisection_with_expansion(c: &mut Criterion) {
    let solver = BisectionRootFinder::new(1e-10, 1e-10).with_expansion_factors(2.0, 2.0);
    c.bench_function("bisection with expansion", |b| {
        b.iter(|| solver.find_root(|x: f64| x * x * x - 2.0 * x - 5.0, black_box(3.0), 4.0))
    });
}

criterion_group!(
    benches,
    bench_rosenbrock_bfgs_b,
    bench_rosenbrock_hessian_seeded,
    bench_bisection_with_expansion
);
criterion_main!(benches);
