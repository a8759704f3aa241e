use num::Float;

#[macro_export]
macro_rules! check_nan {
    ($a:expr, $b:expr, $c: expr) => {{
        use burn::tensor::cast::ToElement;
        if $a.clone().is_nan().int().sum().into_scalar().to_i32() > 0 {
            println!("A = {}", $a);
            println!("B = {}", $b);
            println!("C = {}", $c);
            panic!("found nan in line {}", line!());
        }
    }};
}

// Helper function for comparing floats
pub fn assert_approx_eq<F>(a: &F, b: &F, epsilon: F)
where
    F: Float + std::fmt::Display + std::fmt::Debug,
{
    assert!(
        (*a - *b).abs() <= epsilon,
        "Values differ: {:?} vs {:?} (tolerance: {:?})",
        *a,
        *b,
        epsilon
    );
}
