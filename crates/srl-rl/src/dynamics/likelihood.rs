//! Ensemble log-likelihood scoring

use std::f64::consts::PI;

use ndarray::{Array1, ArrayView2, ArrayView3, Axis, Zip};

use srl_core::{Result, SafeRlError};

/// Mixture log-likelihood of `inputs` under the ensemble and the
/// epistemic spread of the member means.
///
/// Shapes: `inputs [B, k]`, `means` / `variances [E, B, k]`. Each member
/// scores `-1/2 [k ln 2pi + sum ln var + sum (x - mu)^2 / var]`; members are
/// combined as `ln sum_e exp(logp_e)`, so the batch axis survives and the
/// member axis is reduced. The density sum is taken in linear space and
/// underflows to `-inf` once every member's log-density is below roughly
/// -745. The second output is the population standard deviation of the
/// member means, averaged over the `k` output dimensions.
pub fn log_likelihood(
    inputs: ArrayView2<'_, f64>,
    means: ArrayView3<'_, f64>,
    variances: ArrayView3<'_, f64>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let (members, batch, k) = means.dim();
    if variances.dim() != means.dim() {
        return Err(SafeRlError::shape(format!(
            "means {:?} and variances {:?} differ",
            means.dim(),
            variances.dim()
        )));
    }
    if inputs.dim() != (batch, k) {
        return Err(SafeRlError::shape(format!(
            "inputs {:?} do not match ensemble batch {batch} x {k}",
            inputs.dim()
        )));
    }
    if members == 0 {
        return Err(SafeRlError::shape("ensemble prediction has no members"));
    }

    let norm = k as f64 * (2.0 * PI).ln();

    // [E, B]
    let mut member_log_prob = ndarray::Array2::<f64>::zeros((members, batch));
    for e in 0..members {
        let mu = means.index_axis(Axis(0), e);
        let var = variances.index_axis(Axis(0), e);
        Zip::from(member_log_prob.row_mut(e))
            .and(inputs.rows())
            .and(mu.rows())
            .and(var.rows())
            .for_each(|out, x, mu, var| {
                let mut log_det = 0.0;
                let mut mahalanobis = 0.0;
                Zip::from(&x).and(&mu).and(&var).for_each(|&x, &m, &v| {
                    log_det += v.ln();
                    mahalanobis += (x - m).powi(2) / v;
                });
                *out = -0.5 * (norm + log_det + mahalanobis);
            });
    }

    // [B]
    let log_prob = member_log_prob
        .mapv(f64::exp)
        .sum_axis(Axis(0))
        .mapv(f64::ln);

    // std over members -> [B, k], then mean over k -> [B]
    let stds = means
        .std_axis(Axis(0), 0.0)
        .mean_axis(Axis(1))
        .ok_or_else(|| SafeRlError::shape("ensemble prediction has no output dimensions"))?;

    Ok((log_prob, stds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_single_member_exact_mean() {
        let inputs = array![[0.3, -1.2, 4.0]];
        let means = inputs.clone().insert_axis(Axis(0));
        let variances = Array3::<f64>::ones((1, 1, 3));

        let (log_prob, stds) =
            log_likelihood(inputs.view(), means.view(), variances.view()).unwrap();

        let expected = -1.5 * (2.0 * PI).ln();
        assert!((log_prob[0] - expected).abs() < 1e-12);
        assert_eq!(stds[0], 0.0);
    }

    #[test]
    fn test_mixture_of_identical_members() {
        // two identical members double the density: + ln 2
        let inputs = array![[1.0], [2.0]];
        let single = array![[[0.0], [2.0]]];
        let double = ndarray::concatenate(Axis(0), &[single.view(), single.view()]).unwrap();
        let var1 = Array3::<f64>::ones((1, 2, 1));
        let var2 = Array3::<f64>::ones((2, 2, 1));

        let (lp1, _) = log_likelihood(inputs.view(), single.view(), var1.view()).unwrap();
        let (lp2, stds) = log_likelihood(inputs.view(), double.view(), var2.view()).unwrap();

        for b in 0..2 {
            assert!((lp2[b] - lp1[b] - 2f64.ln()).abs() < 1e-12);
        }
        assert_eq!(stds.to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_member_spread() {
        let inputs = array![[0.0, 0.0]];
        // member means 1 and 3 on dim 0, equal on dim 1 -> std 1 and 0
        let means = array![[[1.0, 5.0]], [[3.0, 5.0]]];
        let variances = Array3::<f64>::ones((2, 1, 2));

        let (_, stds) = log_likelihood(inputs.view(), means.view(), variances.view()).unwrap();
        assert!((stds[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_underflow_is_preserved() {
        let inputs = array![[1000.0]];
        let means = array![[[0.0]]];
        let variances = array![[[1.0]]];

        let (log_prob, _) =
            log_likelihood(inputs.view(), means.view(), variances.view()).unwrap();
        assert_eq!(log_prob[0], f64::NEG_INFINITY);
    }

    #[test]
    fn test_shape_mismatch() {
        let inputs = array![[0.0, 0.0]];
        let means = Array3::<f64>::zeros((2, 1, 3));
        let variances = Array3::<f64>::ones((2, 1, 3));
        assert!(matches!(
            log_likelihood(inputs.view(), means.view(), variances.view()),
            Err(SafeRlError::Shape(_))
        ));

        let inputs = array![[0.0, 0.0, 0.0]];
        let variances = Array3::<f64>::ones((2, 2, 3));
        assert!(log_likelihood(inputs.view(), means.view(), variances.view()).is_err());
    }
}
