use std::path::Path;
use log::info;
use ndarray::{Array1, Array2};
use serde::Deserialize;
use crate::analysis::features::{FeatureLayout, FeatureVector};
use crate::drivers::PipelineError;
use crate::types::{ClassProbabilities, Emotion};
/// Per-sample classification.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: Emotion,
    pub probabilities: ClassProbabilities,
}
/// A pretrained model that labels one expanded feature vector.
pub trait Classifier {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PipelineError>;
    /// Features this model expects, in order.
    fn layout(&self) -> &FeatureLayout;
    fn describe(&self) -> String {
        format!("classifier over {} features", self.layout().len())
    }
}
impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PipelineError> {
        (**self).predict(features)
    }
    fn layout(&self) -> &FeatureLayout {
        (**self).layout()
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}
/// On-disk model artifact.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub name: Option<String>,
    pub classes: Vec<String>,
    pub features: Vec<String>,
    pub scaler: ScalerSpec,
    pub model: ModelSpec,
}
#[derive(Clone, Debug, Deserialize)]
pub struct ScalerSpec {
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
    #[serde(default = "unit_range")]
    pub feature_range: (f64, f64),
}
fn unit_range() -> (f64, f64) {
    (0.0, 1.0)
}
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    RandomForest { trees: Vec<TreeSpec> },
    /// One weight row and one bias per class, in artifact class order.
    Softmax { weights: Vec<Vec<f64>>, bias: Vec<f64> },
}
#[derive(Clone, Debug, Deserialize)]
pub struct TreeSpec {
    pub nodes: Vec<NodeSpec>,
}
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}
/// Min-max scaling as fitted by the training toolkit.
#[derive(Clone, Debug)]
pub struct MinMaxScaler {
    data_min: Array1<f64>,
    scale: Array1<f64>,
    range_min: f64,
}
impl MinMaxScaler {
    pub fn fit_from(spec: &ScalerSpec) -> Result<Self, PipelineError> {
        if spec.data_min.len() != spec.data_max.len() {
            return Err(PipelineError::ModelInvalid(format!(
                "scaler data_min has {} entries but data_max has {}",
                spec.data_min.len(),
                spec.data_max.len()
            )));
        }
        let (lo, hi) = spec.feature_range;
        if lo.is_nan() || hi.is_nan() || hi <= lo {
            return Err(PipelineError::ModelInvalid(format!(
                "scaler feature_range ({lo}, {hi}) is empty"
            )));
        }
        let scale = spec
            .data_min
            .iter()
            .zip(&spec.data_max)
            .map(|(min, max)| {
                let range = max - min;
                // constant features keep their offset only
                let range = if range == 0.0 { 1.0 } else { range };
                (hi - lo) / range
            })
            .collect();
        Ok(Self {
            data_min: Array1::from(spec.data_min.clone()),
            scale,
            range_min: lo,
        })
    }
    pub fn len(&self) -> usize {
        self.data_min.len()
    }
    pub fn transform(&self, x: &Array1<f64>) -> Array1<f64> {
        (x - &self.data_min) * &self.scale + self.range_min
    }
}
#[derive(Clone, Debug)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf([f64; 3]),
}
#[derive(Clone, Debug)]
struct Tree {
    nodes: Vec<Node>,
}
impl Tree {
    fn from_spec(spec: &TreeSpec, n_features: usize) -> Result<Self, PipelineError> {
        if spec.nodes.is_empty() {
            return Err(PipelineError::ModelInvalid("tree without nodes".into()));
        }
        let mut nodes = Vec::with_capacity(spec.nodes.len());
        for (i, node) in spec.nodes.iter().enumerate() {
            nodes.push(match node {
                NodeSpec::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(PipelineError::ModelInvalid(format!(
                            "node {i} splits on feature {feature}, model has {n_features}"
                        )));
                    }
                    // children must come later so traversal always terminates
                    for child in [*left, *right] {
                        if child <= i || child >= spec.nodes.len() {
                            return Err(PipelineError::ModelInvalid(format!(
                                "node {i} points at invalid child {child}"
                            )));
                        }
                    }
                    Node::Split {
                        feature: *feature,
                        threshold: *threshold,
                        left: *left,
                        right: *right,
                    }
                }
                NodeSpec::Leaf { value } => Node::Leaf(normalize_leaf(i, value)?),
            });
        }
        Ok(Self { nodes })
    }
    fn leaf_for(&self, x: &Array1<f64>) -> Result<&[f64; 3], PipelineError> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Leaf(dist)) => return Ok(dist),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    index = if x[*feature] <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(PipelineError::ModelInvalid(format!("dangling node index {index}")))
                }
            }
        }
    }
}
fn normalize_leaf(index: usize, value: &[f64]) -> Result<[f64; 3], PipelineError> {
    if value.len() != 3 || value.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(PipelineError::ModelInvalid(format!(
            "leaf {index} must hold three non-negative class weights"
        )));
    }
    let sum: f64 = value.iter().sum();
    if sum <= 0.0 {
        return Err(PipelineError::ModelInvalid(format!("leaf {index} has no weight")));
    }
    Ok([value[0] / sum, value[1] / sum, value[2] / sum])
}
#[derive(Clone, Debug)]
enum Model {
    Forest(Vec<Tree>),
    Softmax { weights: Array2<f64>, bias: Array1<f64> },
}
impl Model {
    fn from_spec(spec: &ModelSpec, n_features: usize) -> Result<Self, PipelineError> {
        match spec {
            ModelSpec::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(PipelineError::ModelInvalid("random forest without trees".into()));
                }
                let trees = trees
                    .iter()
                    .map(|t| Tree::from_spec(t, n_features))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Model::Forest(trees))
            }
            ModelSpec::Softmax { weights, bias } => {
                if weights.len() != 3 || bias.len() != 3 {
                    return Err(PipelineError::ModelInvalid(
                        "softmax needs one weight row and one bias per class".into(),
                    ));
                }
                if weights.iter().any(|row| row.len() != n_features) {
                    return Err(PipelineError::ModelInvalid(format!(
                        "softmax weight rows must have {n_features} entries"
                    )));
                }
                let flat: Vec<f64> = weights.iter().flatten().copied().collect();
                let weights = Array2::from_shape_vec((3, n_features), flat)
                    .map_err(|e| PipelineError::ModelInvalid(e.to_string()))?;
                Ok(Model::Softmax {
                    weights,
                    bias: Array1::from(bias.clone()),
                })
            }
        }
    }
    /// Class probabilities in artifact class order.
    fn probabilities(&self, x: &Array1<f64>) -> Result<[f64; 3], PipelineError> {
        match self {
            Model::Forest(trees) => {
                let mut acc = [0.0; 3];
                for tree in trees {
                    let leaf = tree.leaf_for(x)?;
                    for (a, p) in acc.iter_mut().zip(leaf) {
                        *a += p;
                    }
                }
                let n = trees.len() as f64;
                Ok(acc.map(|a| a / n))
            }
            Model::Softmax { weights, bias } => {
                let logits = weights.dot(x) + bias;
                let max = logits.fold(f64::NEG_INFINITY, |m, v| m.max(*v));
                let exp = logits.mapv(|v| (v - max).exp());
                let sum = exp.sum();
                Ok([exp[0] / sum, exp[1] / sum, exp[2] / sum])
            }
        }
    }
}
/// Classifier backed by a JSON model artifact (scaler plus forest or softmax).
#[derive(Clone, Debug)]
pub struct EmotionClassifier {
    name: String,
    classes: [Emotion; 3],
    layout: FeatureLayout,
    scaler: MinMaxScaler,
    model: Model,
}
impl EmotionClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&text)?;
        let classifier = Self::from_artifact(artifact)?;
        info!("loaded {} from {}", classifier.describe(), path.display());
        Ok(classifier)
    }
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, PipelineError> {
        let classes = parse_classes(&artifact.classes)?;
        let layout = FeatureLayout::from_names(artifact.features.as_slice())?;
        let scaler = MinMaxScaler::fit_from(&artifact.scaler)?;
        if scaler.len() != layout.len() {
            return Err(PipelineError::ModelInvalid(format!(
                "scaler covers {} features, model lists {}",
                scaler.len(),
                layout.len()
            )));
        }
        let model = Model::from_spec(&artifact.model, layout.len())?;
        Ok(Self {
            name: artifact.name.unwrap_or_else(|| "emotion model".to_owned()),
            classes,
            layout,
            scaler,
            model,
        })
    }
}
fn parse_classes(names: &[String]) -> Result<[Emotion; 3], PipelineError> {
    let parsed = names
        .iter()
        .map(|n| Emotion::parse(n).ok_or_else(|| PipelineError::ModelInvalid(format!("unknown class `{n}`"))))
        .collect::<Result<Vec<_>, _>>()?;
    let complete = parsed.len() == 3 && Emotion::ALL.iter().all(|e| parsed.contains(e));
    if !complete {
        return Err(PipelineError::ModelInvalid(format!(
            "classes must be exactly focus, relax and fatigue, got {names:?}"
        )));
    }
    Ok([parsed[0], parsed[1], parsed[2]])
}
impl Classifier for EmotionClassifier {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PipelineError> {
        if features.len() != self.layout.len() {
            return Err(PipelineError::FeatureShape {
                expected: self.layout.len(),
                actual: features.len(),
            });
        }
        let scaled = self.scaler.transform(features.values());
        let raw = self.model.probabilities(&scaled)?;
        if raw.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::NonFiniteOutput { features: features.len() });
        }
        // argmax, ties keep the class listed first
        let mut best = 0;
        for i in 1..3 {
            if raw[i] > raw[best] {
                best = i;
            }
        }
        let mut probabilities = ClassProbabilities::default();
        for (class, p) in self.classes.iter().zip(raw) {
            probabilities.set(*class, p);
        }
        Ok(Prediction {
            label: self.classes[best],
            probabilities,
        })
    }
    fn layout(&self) -> &FeatureLayout {
        &self.layout
    }
    fn describe(&self) -> String {
        let kind = match &self.model {
            Model::Forest(trees) => format!("random forest, {} trees", trees.len()),
            Model::Softmax { .. } => "softmax".to_owned(),
        };
        format!("{} ({kind}, {} features)", self.name, self.layout.len())
    }
}
