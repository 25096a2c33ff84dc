//! ONNX lowering for fitted pipelines
//!
//! The graph has one float input of shape `[N, n_features]` and two nodes
//! from the `ai.onnx.ml` domain:
//!
//! ```text
//! float_input -> Scaler -> variable -> TreeEnsembleClassifier -> label, probabilities
//! ```

use crate::dataset::{FEATURE_COLUMNS, N_FEATURES};
use crate::error::{CardioError, Result};
use crate::training::{DecisionTree, FittedPipeline, TreeNode};
use super::config::ExportConfig;
use super::proto::{
    tensor_shape_proto, type_proto, AttributeProto, AttributeType, ElementType, GraphProto,
    ModelProto, NodeProto, OperatorSetIdProto, StringStringEntryProto, TensorShapeProto,
    TypeProto, ValueInfoProto,
};
use prost::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

const ML_DOMAIN: &str = "ai.onnx.ml";
const IR_VERSION: i64 = 8;
const SCALED_NAME: &str = "variable";
const LABEL_NAME: &str = "label";
const PROBABILITIES_NAME: &str = "probabilities";

/// Tensor shape dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// Fixed size dimension
    Fixed(i64),
    /// Batch dimension left open
    Dynamic,
}

impl Dimension {
    /// `Some(n)` for fixed dimensions
    pub fn size(&self) -> Option<i64> {
        match self {
            Dimension::Fixed(n) => Some(*n),
            Dimension::Dynamic => None,
        }
    }

    fn to_proto(&self) -> tensor_shape_proto::Dimension {
        tensor_shape_proto::Dimension {
            value: self.size().map(tensor_shape_proto::dimension::Value::DimValue),
            denotation: String::new(),
        }
    }

    fn from_proto(dim: &tensor_shape_proto::Dimension) -> Self {
        match dim.value {
            Some(tensor_shape_proto::dimension::Value::DimValue(n)) => Dimension::Fixed(n),
            _ => Dimension::Dynamic,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Fixed(n) => write!(f, "{}", n),
            Dimension::Dynamic => write!(f, "None"),
        }
    }
}

/// Graph input or output declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    /// ONNX element type code
    pub elem_type: i32,
    pub shape: Vec<Dimension>,
}

impl TensorSpec {
    pub fn float(name: impl Into<String>, shape: Vec<Dimension>) -> Self {
        Self {
            name: name.into(),
            elem_type: ElementType::Float as i32,
            shape,
        }
    }

    pub fn int64(name: impl Into<String>, shape: Vec<Dimension>) -> Self {
        Self {
            name: name.into(),
            elem_type: ElementType::Int64 as i32,
            shape,
        }
    }

    /// Element type name, `"unknown"` for codes this crate never writes
    pub fn elem_type_name(&self) -> &'static str {
        match ElementType::try_from(self.elem_type) {
            Ok(ElementType::Float) => "float32",
            Ok(ElementType::Int64) => "int64",
            _ => "unknown",
        }
    }

    fn to_proto(&self) -> ValueInfoProto {
        ValueInfoProto {
            name: self.name.clone(),
            r#type: Some(TypeProto {
                value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                    elem_type: self.elem_type,
                    shape: Some(TensorShapeProto {
                        dim: self.shape.iter().map(Dimension::to_proto).collect(),
                    }),
                })),
            }),
            doc_string: String::new(),
        }
    }

    fn from_proto(info: &ValueInfoProto) -> Self {
        let tensor = info.r#type.as_ref().and_then(|t| match &t.value {
            Some(type_proto::Value::TensorType(tensor)) => Some(tensor),
            None => None,
        });
        Self {
            name: info.name.clone(),
            elem_type: tensor.map_or(0, |t| t.elem_type),
            shape: tensor
                .and_then(|t| t.shape.as_ref())
                .map(|s| s.dim.iter().map(Dimension::from_proto).collect())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(ToString::to_string).collect();
        write!(f, "{}: {} [{}]", self.name, self.elem_type_name(), dims.join(", "))
    }
}

/// Node attribute value
#[derive(Debug, Clone)]
enum Attribute {
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
}

/// Operator node; attributes keep insertion order so encoding is stable
#[derive(Debug, Clone)]
struct OnnxNode {
    name: String,
    op_type: String,
    domain: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    attributes: Vec<(String, Attribute)>,
}

impl OnnxNode {
    fn new(op_type: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            name: op_type.to_string(),
            op_type: op_type.to_string(),
            domain: ML_DOMAIN.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    fn with_attribute(mut self, key: &str, value: Attribute) -> Self {
        self.attributes.push((key.to_string(), value));
        self
    }

    fn to_proto(&self) -> NodeProto {
        NodeProto {
            input: self.inputs.clone(),
            output: self.outputs.clone(),
            name: self.name.clone(),
            op_type: self.op_type.clone(),
            attribute: self
                .attributes
                .iter()
                .map(|(name, value)| attribute_proto(name, value))
                .collect(),
            doc_string: String::new(),
            domain: self.domain.clone(),
        }
    }
}

fn attribute_proto(name: &str, value: &Attribute) -> AttributeProto {
    let mut proto = AttributeProto {
        name: name.to_string(),
        ..Default::default()
    };
    match value {
        Attribute::String(v) => {
            proto.s = v.as_bytes().to_vec();
            proto.r#type = AttributeType::String as i32;
        }
        Attribute::Ints(v) => {
            proto.ints = v.clone();
            proto.r#type = AttributeType::Ints as i32;
        }
        Attribute::Floats(v) => {
            proto.floats = v.clone();
            proto.r#type = AttributeType::Floats as i32;
        }
        Attribute::Strings(v) => {
            proto.strings = v.iter().map(|s| s.as_bytes().to_vec()).collect();
            proto.r#type = AttributeType::Strings as i32;
        }
    }
    proto
}

/// Flattened tree ensemble in `TreeEnsembleClassifier` attribute layout
#[derive(Debug, Default)]
struct EnsembleTables {
    nodes_treeids: Vec<i64>,
    nodes_nodeids: Vec<i64>,
    nodes_featureids: Vec<i64>,
    nodes_values: Vec<f32>,
    nodes_modes: Vec<String>,
    nodes_truenodeids: Vec<i64>,
    nodes_falsenodeids: Vec<i64>,
    class_treeids: Vec<i64>,
    class_nodeids: Vec<i64>,
    class_ids: Vec<i64>,
    class_weights: Vec<f32>,
}

impl EnsembleTables {
    fn from_trees(trees: &[DecisionTree]) -> Result<Self> {
        let mut tables = Self::default();
        let leaf_scale = 1.0 / trees.len() as f64;
        for (tree_id, tree) in trees.iter().enumerate() {
            let root = tree.root().ok_or_else(|| {
                CardioError::ExportError(format!("tree {} has not been fitted", tree_id))
            })?;
            let mut next_id = 0i64;
            tables.push_node(tree_id as i64, root, &mut next_id, leaf_scale);
        }
        Ok(tables)
    }

    /// Append `node` and its subtree in preorder; returns the node's id.
    fn push_node(&mut self, tree_id: i64, node: &TreeNode, next_id: &mut i64, leaf_scale: f64) -> i64 {
        let node_id = *next_id;
        *next_id += 1;

        let slot = self.nodes_nodeids.len();
        self.nodes_treeids.push(tree_id);
        self.nodes_nodeids.push(node_id);

        match node {
            TreeNode::Leaf { distribution, .. } => {
                self.nodes_featureids.push(0);
                self.nodes_values.push(0.0);
                self.nodes_modes.push("LEAF".to_string());
                self.nodes_truenodeids.push(0);
                self.nodes_falsenodeids.push(0);

                for (class_id, &p) in distribution.iter().enumerate() {
                    self.class_treeids.push(tree_id);
                    self.class_nodeids.push(node_id);
                    self.class_ids.push(class_id as i64);
                    self.class_weights.push((p * leaf_scale) as f32);
                }
            }
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                self.nodes_featureids.push(*feature_idx as i64);
                self.nodes_values.push(*threshold as f32);
                self.nodes_modes.push("BRANCH_LEQ".to_string());
                self.nodes_truenodeids.push(0);
                self.nodes_falsenodeids.push(0);

                let left_id = self.push_node(tree_id, left, next_id, leaf_scale);
                let right_id = self.push_node(tree_id, right, next_id, leaf_scale);
                self.nodes_truenodeids[slot] = left_id;
                self.nodes_falsenodeids[slot] = right_id;
            }
        }

        node_id
    }

    fn n_nodes(&self) -> usize {
        self.nodes_nodeids.len()
    }
}

/// Encoded graph plus its declared interface
#[derive(Debug, Clone)]
pub struct ExportedGraph {
    bytes: Vec<u8>,
    input: TensorSpec,
    outputs: Vec<TensorSpec>,
}

impl ExportedGraph {
    /// Serialized `ModelProto`
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn input(&self) -> &TensorSpec {
        &self.input
    }

    pub fn input_name(&self) -> &str {
        &self.input.name
    }

    /// Input shape with `None` for the batch dimension
    pub fn input_shape(&self) -> Vec<Option<i64>> {
        self.input.shape.iter().map(Dimension::size).collect()
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }
}

/// Lower a fitted pipeline to an ONNX model.
///
/// Fails with [`CardioError::ExportError`] when a stage cannot be expressed:
/// an unfitted stage, a scaler whose width is not the declared feature
/// count, an empty forest, or non-integer class labels.
pub fn lower_pipeline(pipeline: &FittedPipeline, config: &ExportConfig) -> Result<ExportedGraph> {
    for stage in pipeline.stages() {
        if !stage.is_fitted() {
            return Err(CardioError::ExportError(format!(
                "stage '{}' is not fitted",
                stage.name()
            )));
        }
    }

    let scaler = pipeline.scaler();
    if scaler.n_features() != N_FEATURES {
        return Err(CardioError::ExportError(format!(
            "scaler expects {} inputs but the graph declares {}",
            scaler.n_features(),
            N_FEATURES
        )));
    }
    if pipeline.feature_names().iter().map(String::as_str).ne(FEATURE_COLUMNS) {
        return Err(CardioError::ExportError(format!(
            "pipeline features {:?} do not match the graph input order {:?}",
            pipeline.feature_names(),
            FEATURE_COLUMNS
        )));
    }

    let forest = pipeline.forest();
    if forest.trees().is_empty() {
        return Err(CardioError::ExportError("forest has no trees".to_string()));
    }
    if let Some(bad) = forest.classes().iter().find(|c| c.fract() != 0.0) {
        return Err(CardioError::ExportError(format!(
            "class label {} cannot be written as an int64 label",
            bad
        )));
    }
    let classes: Vec<i64> = pipeline.classes();

    let offsets: Vec<f32> = scaler.means().iter().map(|&m| m as f32).collect();
    let scales: Vec<f32> = scaler.scales().iter().map(|&s| (1.0 / s) as f32).collect();

    let scaler_node = OnnxNode::new("Scaler", &[config.input_name.as_str()], &[SCALED_NAME])
        .with_attribute("offset", Attribute::Floats(offsets))
        .with_attribute("scale", Attribute::Floats(scales));

    let tables = EnsembleTables::from_trees(forest.trees())?;
    debug!("Flattened {} trees into {} nodes", forest.trees().len(), tables.n_nodes());

    let forest_node = OnnxNode::new("TreeEnsembleClassifier", &[SCALED_NAME], &[LABEL_NAME, PROBABILITIES_NAME])
        .with_attribute("class_ids", Attribute::Ints(tables.class_ids))
        .with_attribute("class_nodeids", Attribute::Ints(tables.class_nodeids))
        .with_attribute("class_treeids", Attribute::Ints(tables.class_treeids))
        .with_attribute("class_weights", Attribute::Floats(tables.class_weights))
        .with_attribute("classlabels_int64s", Attribute::Ints(classes.clone()))
        .with_attribute("nodes_falsenodeids", Attribute::Ints(tables.nodes_falsenodeids))
        .with_attribute("nodes_featureids", Attribute::Ints(tables.nodes_featureids))
        .with_attribute("nodes_modes", Attribute::Strings(tables.nodes_modes))
        .with_attribute("nodes_nodeids", Attribute::Ints(tables.nodes_nodeids))
        .with_attribute("nodes_treeids", Attribute::Ints(tables.nodes_treeids))
        .with_attribute("nodes_truenodeids", Attribute::Ints(tables.nodes_truenodeids))
        .with_attribute("nodes_values", Attribute::Floats(tables.nodes_values))
        .with_attribute("post_transform", Attribute::String("NONE".to_string()));

    let input = TensorSpec::float(
        config.input_name.clone(),
        vec![Dimension::Dynamic, Dimension::Fixed(N_FEATURES as i64)],
    );
    let outputs = vec![
        TensorSpec::int64(LABEL_NAME, vec![Dimension::Dynamic]),
        TensorSpec::float(
            PROBABILITIES_NAME,
            vec![Dimension::Dynamic, Dimension::Fixed(classes.len() as i64)],
        ),
    ];

    let model = ModelProto {
        ir_version: IR_VERSION,
        producer_name: config.producer_name.clone(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        domain: String::new(),
        model_version: 1,
        doc_string: "Standard scaler followed by a random forest classifier".to_string(),
        graph: Some(GraphProto {
            node: vec![scaler_node.to_proto(), forest_node.to_proto()],
            name: "heart_disease_pipeline".to_string(),
            doc_string: String::new(),
            input: vec![input.to_proto()],
            output: outputs.iter().map(TensorSpec::to_proto).collect(),
        }),
        opset_import: vec![
            OperatorSetIdProto {
                domain: String::new(),
                version: config.opset_version,
            },
            OperatorSetIdProto {
                domain: ML_DOMAIN.to_string(),
                version: config.ml_opset_version,
            },
        ],
        metadata_props: vec![
            StringStringEntryProto {
                key: "feature_names".to_string(),
                value: pipeline.feature_names().join(","),
            },
            StringStringEntryProto {
                key: "target_column".to_string(),
                value: config.target_column.clone(),
            },
        ],
    };

    let bytes = model.encode_to_vec();
    info!("Lowered pipeline to ONNX graph ({} bytes), input {}", bytes.len(), input);

    Ok(ExportedGraph { bytes, input, outputs })
}

/// Declared interface of an encoded graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSignature {
    pub producer_name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    /// `op_type` of every node, in graph order
    pub operators: Vec<String>,
    /// (domain, version) pairs
    pub opsets: Vec<(String, i64)>,
    /// Feature order recorded at export, empty if absent
    pub feature_names: Vec<String>,
    pub target_column: Option<String>,
}

impl GraphSignature {
    /// The first declared input, if any
    pub fn input(&self) -> Option<&TensorSpec> {
        self.inputs.first()
    }
}

/// Decode an exported graph and report its interface.
pub fn inspect_graph(bytes: &[u8]) -> Result<GraphSignature> {
    let model = ModelProto::decode(bytes)?;
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| CardioError::SerializationError("model has no graph".to_string()))?;

    let metadata = |key: &str| {
        model
            .metadata_props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.clone())
    };

    Ok(GraphSignature {
        producer_name: model.producer_name.clone(),
        inputs: graph.input.iter().map(TensorSpec::from_proto).collect(),
        outputs: graph.output.iter().map(TensorSpec::from_proto).collect(),
        operators: graph.node.iter().map(|n| n.op_type.clone()).collect(),
        opsets: model
            .opset_import
            .iter()
            .map(|o| (o.domain.clone(), o.version))
            .collect(),
        feature_names: metadata("feature_names")
            .map(|v| v.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        target_column: metadata("target_column"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{Pipeline, TrainingConfig};
    use ndarray::{Array1, Array2};

    fn fitted_with_names(names: Vec<String>) -> FittedPipeline {
        let n_features = names.len();
        let x = Array2::from_shape_fn((30, n_features), |(i, j)| (i % 3) as f64 * 2.0 + j as f64 * 0.5);
        let y = Array1::from_shape_fn(30, |i| (i % 3 == 0) as i64);
        Pipeline::new(TrainingConfig::default().with_n_estimators(5))
            .with_feature_names(names)
            .fit(&x, &y)
            .unwrap()
    }

    fn fitted(n_features: usize) -> FittedPipeline {
        let names = if n_features == N_FEATURES {
            FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()
        } else {
            (0..n_features).map(|j| format!("f{}", j)).collect()
        };
        fitted_with_names(names)
    }

    #[test]
    fn test_foreign_feature_names_are_export_error() {
        let mut names: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
        names.swap(0, 12);
        let err = lower_pipeline(&fitted_with_names(names), &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, CardioError::ExportError(_)));

        let renamed = (0..N_FEATURES).map(|j| format!("f{}", j)).collect();
        assert!(lower_pipeline(&fitted_with_names(renamed), &ExportConfig::default()).is_err());
    }

    #[test]
    fn test_declared_input() {
        let graph = lower_pipeline(&fitted(N_FEATURES), &ExportConfig::default()).unwrap();
        assert_eq!(graph.input_name(), "float_input");
        assert_eq!(graph.input_shape(), vec![None, Some(13)]);
        assert_eq!(graph.input().elem_type, ElementType::Float as i32);
    }

    #[test]
    fn test_inspect_matches_lowering() {
        let graph = lower_pipeline(&fitted(N_FEATURES), &ExportConfig::default()).unwrap();
        let sig = inspect_graph(graph.bytes()).unwrap();

        assert_eq!(sig.input(), Some(graph.input()));
        assert_eq!(sig.operators, vec!["Scaler", "TreeEnsembleClassifier"]);
        assert_eq!(sig.outputs.len(), 2);
        assert_eq!(sig.outputs[1].shape, vec![Dimension::Dynamic, Dimension::Fixed(2)]);
        assert!(sig.opsets.contains(&("ai.onnx.ml".to_string(), 1)));
        assert_eq!(sig.feature_names.len(), 13);
        assert_eq!(sig.target_column.as_deref(), Some("target"));
    }

    #[test]
    fn test_wrong_width_is_export_error() {
        let err = lower_pipeline(&fitted(4), &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, CardioError::ExportError(_)));
    }

    #[test]
    fn test_preorder_node_ids() {
        let pipeline = fitted(N_FEATURES);
        let tables = EnsembleTables::from_trees(pipeline.forest().trees()).unwrap();
        let total: usize = pipeline.forest().trees().iter().map(|t| t.get_n_nodes()).sum();
        assert_eq!(tables.n_nodes(), total);

        // children always come after their parent
        for i in 0..tables.n_nodes() {
            if tables.nodes_modes[i] == "BRANCH_LEQ" {
                assert!(tables.nodes_truenodeids[i] > tables.nodes_nodeids[i]);
                assert!(tables.nodes_falsenodeids[i] > tables.nodes_truenodeids[i]);
            }
        }
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(inspect_graph(&[0xff, 0xff, 0xff]).is_err());
    }
}
