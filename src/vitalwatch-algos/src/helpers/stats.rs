pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0_f64
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        0_f64
    } else {
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
            / (values.len() - 1) as f64;
        variance.sqrt()
    }
}

/// Pearson correlation coefficient. Zero when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0_f64;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mx = mean(xs);
    let my = mean(ys);

    let (cov, vx, vy) = xs
        .iter()
        .zip(ys)
        .fold((0_f64, 0_f64, 0_f64), |(cov, vx, vy), (x, y)| {
            let dx = x - mx;
            let dy = y - my;
            (cov + dx * dy, vx + dx * dx, vy + dy * dy)
        });

    if vx < f64::EPSILON || vy < f64::EPSILON {
        0_f64
    } else {
        (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
    }
}

pub fn round_float(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
