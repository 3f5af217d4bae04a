use ndarray::Array1;
use once_cell::sync::Lazy;
use crate::drivers::PipelineError;
use crate::types::Sample;
const EPS: f64 = 0.001;
/// Every derived feature the classifier can be trained on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    AlphaAmplitude,
    BetaAmplitude,
    ThetaAmplitude,
    AlphaBetaAmplitude,
    ReservedA,
    AlphaBetaRatio,
    BetaThetaRatio,
    AlphaThetaRatio,
    ReservedB,
    ThetaAlphaRatio,
    TotalPower,
    FocusWeightedPower,
    EmotionIndex,
    SpectralWeighting,
    AttentionRatio,
    BandProduct,
    SpectralComplexity,
}
impl FeatureKind {
    pub const ALL: [FeatureKind; 17] = [
        FeatureKind::AlphaAmplitude,
        FeatureKind::BetaAmplitude,
        FeatureKind::ThetaAmplitude,
        FeatureKind::AlphaBetaAmplitude,
        FeatureKind::ReservedA,
        FeatureKind::AlphaBetaRatio,
        FeatureKind::BetaThetaRatio,
        FeatureKind::AlphaThetaRatio,
        FeatureKind::ReservedB,
        FeatureKind::ThetaAlphaRatio,
        FeatureKind::TotalPower,
        FeatureKind::FocusWeightedPower,
        FeatureKind::EmotionIndex,
        FeatureKind::SpectralWeighting,
        FeatureKind::AttentionRatio,
        FeatureKind::BandProduct,
        FeatureKind::SpectralComplexity,
    ];
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::AlphaAmplitude => "alpha_amplitude",
            FeatureKind::BetaAmplitude => "beta_amplitude",
            FeatureKind::ThetaAmplitude => "theta_amplitude",
            FeatureKind::AlphaBetaAmplitude => "alpha_beta_amplitude",
            FeatureKind::ReservedA => "reserved_a",
            FeatureKind::AlphaBetaRatio => "alpha_beta_ratio",
            FeatureKind::BetaThetaRatio => "beta_theta_ratio",
            FeatureKind::AlphaThetaRatio => "alpha_theta_ratio",
            FeatureKind::ReservedB => "reserved_b",
            FeatureKind::ThetaAlphaRatio => "theta_alpha_ratio",
            FeatureKind::TotalPower => "total_power",
            FeatureKind::FocusWeightedPower => "focus_weighted_power",
            FeatureKind::EmotionIndex => "emotion_index",
            FeatureKind::SpectralWeighting => "spectral_weighting",
            FeatureKind::AttentionRatio => "attention_ratio",
            FeatureKind::BandProduct => "band_product",
            FeatureKind::SpectralComplexity => "spectral_complexity",
        }
    }
    pub fn from_name(name: &str) -> Option<Self> {
        FeatureKind::ALL.into_iter().find(|k| k.name() == name)
    }
    pub fn compute(&self, alpha: f64, beta: f64, theta: f64) -> f64 {
        match self {
            FeatureKind::AlphaAmplitude => 50.0 * alpha,
            FeatureKind::BetaAmplitude => 60.0 * beta,
            FeatureKind::ThetaAmplitude => 80.0 * theta,
            FeatureKind::AlphaBetaAmplitude => 40.0 * (alpha + beta),
            FeatureKind::ReservedA | FeatureKind::ReservedB => 0.0,
            FeatureKind::AlphaBetaRatio => alpha / (beta + EPS),
            FeatureKind::BetaThetaRatio => beta / (theta + EPS),
            FeatureKind::AlphaThetaRatio => alpha / (theta + EPS),
            FeatureKind::ThetaAlphaRatio => theta / (alpha + EPS),
            FeatureKind::TotalPower => 6.0 * (alpha + beta + theta),
            FeatureKind::FocusWeightedPower => 20.0 * beta + 8.0 * alpha,
            FeatureKind::EmotionIndex => (beta - theta) + 0.5 * alpha,
            FeatureKind::SpectralWeighting => 15.0 * beta + 5.0 * alpha,
            FeatureKind::AttentionRatio => 3.0 * beta / (alpha + EPS),
            FeatureKind::BandProduct => 50.0 * alpha * beta * theta,
            FeatureKind::SpectralComplexity => 2.0 * (alpha * beta * theta).sqrt(),
        }
    }
}
/// Expanded representation of one sample, in the order its layout defines.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Array1<f64>);
impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn values(&self) -> &Array1<f64> {
        &self.0
    }
}
impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(Array1::from(values))
    }
}
/// Ordered list of features a model was trained with.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureLayout {
    kinds: Vec<FeatureKind>,
}
/// All seventeen features in table order.
pub static DEFAULT_LAYOUT: Lazy<FeatureLayout> = Lazy::new(|| FeatureLayout {
    kinds: FeatureKind::ALL.to_vec(),
});
impl FeatureLayout {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, PipelineError> {
        if names.is_empty() {
            return Err(PipelineError::ModelInvalid("feature list is empty".into()));
        }
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let kind = FeatureKind::from_name(name)
                .ok_or_else(|| PipelineError::UnknownFeature(name.to_owned()))?;
            if kinds.contains(&kind) {
                return Err(PipelineError::ModelInvalid(format!("feature `{name}` listed twice")));
            }
            kinds.push(kind);
        }
        Ok(Self { kinds })
    }
    pub fn len(&self) -> usize {
        self.kinds.len()
    }
    pub fn expand(&self, sample: &Sample) -> FeatureVector {
        let (a, b, t) = (sample.alpha, sample.beta, sample.theta);
        FeatureVector(self.kinds.iter().map(|k| k.compute(a, b, t)).collect())
    }
}
