use rand::{Rng, rngs::StdRng, seq::index};

/// Euler–Mascheroni constant, for the harmonic number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest (Liu, Ting & Zhou 2008).
///
/// Each tree isolates a random sub-sample by splitting on a random feature at
/// a uniform threshold between that feature's min and max. Outliers are
/// separated in few splits, so their average path length is short.
pub(crate) struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl IsolationForest {
    pub fn fit<const N: usize>(
        data: &[[f64; N]],
        trees: usize,
        sample_size: usize,
        rng: &mut StdRng,
    ) -> Self {
        let sample_size = sample_size.min(data.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..trees)
            .map(|_| {
                let sample = index::sample(rng, data.len(), sample_size).into_vec();
                Node::build(data, sample, 0, height_limit, rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Negated anomaly score `-2^(-E[h(x)] / c(ψ))`, in [-1, 0). Lower is
    /// more anomalous.
    pub fn score_samples(&self, point: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(point, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normaliser = average_path_length(self.sample_size);
        if normaliser <= 0.0 {
            return -0.5;
        }
        -(2_f64.powf(-mean_path / normaliser))
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }
}

impl Node {
    fn build<const N: usize>(
        data: &[[f64; N]],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        if depth >= height_limit || indices.len() <= 1 {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let ranges = (0..N)
            .filter_map(|feature| {
                let (min, max) = indices.iter().map(|&i| data[i][feature]).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(min, max), v| (min.min(v), max.max(v)),
                );
                (max > min).then_some((feature, min, max))
            })
            .collect::<Vec<_>>();

        // every remaining point is identical
        if ranges.is_empty() {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let (feature, min, max) = ranges[rng.random_range(0..ranges.len())];
        let threshold = rng.random_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data[i][feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::build(data, left, depth + 1, height_limit, rng)),
            right: Box::new(Node::build(data, right, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, point: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let next = if point[*feature] < *threshold {
                    left
                } else {
                    right
                };
                next.path_length(point, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points, used
/// both to normalise scores and to credit the unexpanded part of a leaf.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
