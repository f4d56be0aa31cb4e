// ============================================================
// Layer 5: Baseline Models
// ============================================================
// Flat-feature baselines the fusion network is compared against.
// All read the design matrix x = [numeric | categorical codes | topics]
// of shape [n, p] and predict [n, tasks].
//
//   LR    linear regression            Linear(p → tasks), MSE
//   LogR  logistic regression          σ(Linear(p → tasks)), BCE
//   LLR   lasso-style regression       x · (θ ⊙ Γ)ᵀ + b,
//                                      ‖y − ŷ‖² + λ₁Σθ + λ₂ΣΓ
//   SLR   single-task regression       Linear(p → 1) on y[:, y_index], MSE
//
// Regression baselines report R² / adjusted R² per task,
// the logistic one reports accuracy / precision / recall / F1.
//
// `text` selects the title-only classifier (title_classifier.rs),
// which reads token ids instead of the design matrix.

use burn::{
    module::Param,
    nn::{
        loss::{MseLoss, Reduction},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::sigmoid, Distribution},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum BaselineKind {
    /// Linear regression
    Lr,
    /// Logistic regression
    Logr,
    /// Lasso-style multi-task regression
    Llr,
    /// Single-task linear regression
    Slr,
    /// Title-only encoder classifier
    Text,
}

impl BaselineKind {
    pub fn name(self) -> &'static str {
        match self {
            BaselineKind::Lr => "lr",
            BaselineKind::Logr => "logr",
            BaselineKind::Llr => "llr",
            BaselineKind::Slr => "slr",
            BaselineKind::Text => "text",
        }
    }

    pub fn is_classifier(self) -> bool {
        matches!(self, BaselineKind::Logr | BaselineKind::Text)
    }

    /// Whether the model trains on the design matrix
    pub fn uses_design_matrix(self) -> bool {
        !matches!(self, BaselineKind::Text)
    }
}

pub struct BaselineOutput<B: Backend> {
    pub loss:       Tensor<B, 1>,
    /// [n, tasks] (probabilities for the classifier)
    pub prediction: Tensor<B, 2>,
    /// The target columns the loss was computed against
    pub target:     Tensor<B, 2>,
}

/// Common surface the baseline trainer drives.
pub trait Baseline<B: Backend> {
    fn forward_loss(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> BaselineOutput<B>;
}

fn mse<B: Backend>(pred: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    MseLoss::new().forward(pred, target, Reduction::Mean)
}

// ─── LR ───────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LinearRegressionConfig {
    pub n_features: usize,
    pub n_tasks:    usize,
}

impl LinearRegressionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LinearRegression<B> {
        LinearRegression { linear: LinearConfig::new(self.n_features, self.n_tasks).init(device) }
    }
}

#[derive(Module, Debug)]
pub struct LinearRegression<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> Baseline<B> for LinearRegression<B> {
    fn forward_loss(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> BaselineOutput<B> {
        let prediction = self.linear.forward(x);
        BaselineOutput { loss: mse(prediction.clone(), y.clone()), prediction, target: y }
    }
}

// ─── LogR ─────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LogisticRegressionConfig {
    pub n_features: usize,
    pub n_tasks:    usize,
}

impl LogisticRegressionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LogisticRegression<B> {
        LogisticRegression { linear: LinearConfig::new(self.n_features, self.n_tasks).init(device) }
    }
}

#[derive(Module, Debug)]
pub struct LogisticRegression<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> Baseline<B> for LogisticRegression<B> {
    /// Binary cross-entropy on the logits z:
    /// max(z, 0) − z·y + ln(1 + e^{−|z|}), averaged
    fn forward_loss(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> BaselineOutput<B> {
        let logits = self.linear.forward(x);
        let loss = (logits.clone().clamp_min(0.0)
            - logits.clone() * y.clone()
            + logits.clone().abs().neg().exp().log1p())
            .mean();
        BaselineOutput { loss, prediction: sigmoid(logits), target: y }
    }
}

// ─── LLR ──────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LassoRegressionConfig {
    pub n_features: usize,
    pub n_tasks:    usize,
    #[config(default = 0.1)]
    pub lambda1:    f64,
    #[config(default = 0.1)]
    pub lambda2:    f64,
}

impl LassoRegressionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LassoRegression<B> {
        let normal = Distribution::Normal(0.0, 1.0);
        LassoRegression {
            theta:   Param::from_tensor(Tensor::random([self.n_features], normal, device)),
            gamma:   Param::from_tensor(Tensor::random([self.n_tasks, self.n_features], normal, device)),
            bias:    Param::from_tensor(Tensor::random([self.n_tasks], normal, device)),
            lambda1: self.lambda1,
            lambda2: self.lambda2,
        }
    }
}

#[derive(Module, Debug)]
pub struct LassoRegression<B: Backend> {
    /// Shared feature weights [p]
    pub theta:   Param<Tensor<B, 1>>,
    /// Task-specific weights [tasks, p]
    pub gamma:   Param<Tensor<B, 2>>,
    pub bias:    Param<Tensor<B, 1>>,
    pub lambda1: f64,
    pub lambda2: f64,
}

impl<B: Backend> LassoRegression<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let weights = self.gamma.val() * self.theta.val().unsqueeze::<2>(); // [tasks, p]
        x.matmul(weights.transpose()) + self.bias.val().unsqueeze::<2>()
    }
}

impl<B: Backend> Baseline<B> for LassoRegression<B> {
    fn forward_loss(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> BaselineOutput<B> {
        let prediction = self.forward(x);
        let residual   = (y.clone() - prediction.clone()).powf_scalar(2.0).sum();
        let loss = residual
            + self.theta.val().sum() * self.lambda1
            + self.gamma.val().sum() * self.lambda2;
        BaselineOutput { loss, prediction, target: y }
    }
}

// ─── SLR ──────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct SingleTaskRegressionConfig {
    pub n_features: usize,
    pub y_index:    usize,
}

impl SingleTaskRegressionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SingleTaskRegression<B> {
        SingleTaskRegression {
            linear:  LinearConfig::new(self.n_features, 1).init(device),
            y_index: self.y_index,
        }
    }
}

#[derive(Module, Debug)]
pub struct SingleTaskRegression<B: Backend> {
    pub linear:  Linear<B>,
    pub y_index: usize,
}

impl<B: Backend> Baseline<B> for SingleTaskRegression<B> {
    fn forward_loss(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> BaselineOutput<B> {
        let [n, _] = y.dims();
        let target = y.slice([0..n, self.y_index..self.y_index + 1]);
        let prediction = self.linear.forward(x);
        BaselineOutput { loss: mse(prediction.clone(), target.clone()), prediction, target }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn design(device: &<TestBackend as Backend>::Device) -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 2>) {
        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 2.0], [0.0, 1.0, 1.0], [3.0, 1.0, 0.0], [1.0, 1.0, 1.0]], device);
        let y = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]], device);
        (x, y)
    }

    #[test]
    fn test_prediction_shapes() {
        let device = Default::default();
        let (x, y) = design(&device);

        let lr = LinearRegressionConfig::new(3, 2).init::<TestBackend>(&device);
        assert_eq!(lr.forward_loss(x.clone(), y.clone()).prediction.dims(), [4, 2]);

        let llr = LassoRegressionConfig::new(3, 2).init::<TestBackend>(&device);
        assert_eq!(llr.forward_loss(x.clone(), y.clone()).prediction.dims(), [4, 2]);

        let slr = SingleTaskRegressionConfig::new(3, 1).init::<TestBackend>(&device);
        let out = slr.forward_loss(x, y);
        assert_eq!(out.prediction.dims(), [4, 1]);
        assert_eq!(out.target.into_data().to_vec::<f32>().unwrap(), vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_logistic_outputs_probabilities_and_finite_loss() {
        let device = Default::default();
        let (x, y) = design(&device);
        let logr = LogisticRegressionConfig::new(3, 2).init::<TestBackend>(&device);
        let out = logr.forward_loss(x * 1e4, y);

        let probs: Vec<f32> = out.prediction.into_data().to_vec().unwrap();
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        let loss: f32 = out.loss.into_scalar();
        assert!(loss.is_finite() && loss >= 0.0);
    }

    #[test]
    fn test_lasso_loss_adds_penalties() {
        let device = Default::default();
        let (x, y) = design(&device);
        let llr = LassoRegressionConfig::new(3, 2).init::<TestBackend>(&device);
        let out = llr.forward_loss(x, y.clone());

        let residual: f32 = (y - out.prediction).powf_scalar(2.0).sum().into_scalar();
        let theta: f32 = llr.theta.val().sum().into_scalar();
        let gamma: f32 = llr.gamma.val().sum().into_scalar();
        let loss: f32 = out.loss.into_scalar();
        assert!((loss - (residual + 0.1 * theta + 0.1 * gamma)).abs() < 1e-3);
    }

    #[test]
    fn test_lasso_weights_are_elementwise_product() {
        let device = Default::default();
        let mut llr = LassoRegressionConfig::new(2, 1).init::<TestBackend>(&device);
        llr.theta = Param::from_tensor(Tensor::from_floats([2.0, 3.0], &device));
        llr.gamma = Param::from_tensor(Tensor::from_floats([[1.0, -1.0]], &device));
        llr.bias  = Param::from_tensor(Tensor::from_floats([0.5], &device));

        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0]], &device);
        let y: f32 = llr.forward(x).into_scalar();
        // 1·(2·1) + 1·(3·−1) + 0.5
        assert!((y - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_only_the_text_baseline_skips_the_design_matrix() {
        assert!(BaselineKind::Text.is_classifier());
        assert!(!BaselineKind::Text.uses_design_matrix());
        for kind in [BaselineKind::Lr, BaselineKind::Logr, BaselineKind::Llr, BaselineKind::Slr] {
            assert!(kind.uses_design_matrix());
        }
        assert_eq!(BaselineKind::from_str("text", true), Ok(BaselineKind::Text));
    }
}
