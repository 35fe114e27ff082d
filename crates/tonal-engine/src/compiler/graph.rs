//! Filter-graph form of a compiled pipeline.
//!
//! Nodes form an ordered acyclic graph over named intermediate buffers. The
//! first input is always [`SOURCE`]; the last node is a [`Primitive::Merge`]
//! producing [`OUTPUT`]. The graph renders to an ffmpeg `filter_complex`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

use super::ops::ColorOperation;

pub const SOURCE: &str = "source";
pub const OUTPUT: &str = "output";

/// Per-channel transfer function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferFunction {
    /// `slope · c + intercept`
    Linear { slope: [f64; 3], intercept: [f64; 3] },
    /// Piecewise-linear lookup, same table for every channel
    Table { values: Vec<f64> },
    /// `amplitude · c^exponent + offset`
    Gamma {
        amplitude: f64,
        exponent: f64,
        offset: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    ComponentTransfer { function: TransferFunction },
    ColorMatrix { values: Vec<f64> },
    GaussianBlur { sigma: f64 },
    /// `k1·a·b + k2·a + k3·b + k4` over two inputs
    Arithmetic { k1: f64, k2: f64, k3: f64, k4: f64 },
    Grain { alpha: f64, seed: u32 },
    Vibrance { amount: f64 },
    Merge,
}

impl Primitive {
    pub fn arity(&self) -> usize {
        match self {
            Primitive::Arithmetic { .. } => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub result: String,
    pub inputs: Vec<String>,
    pub primitive: Primitive,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterGraph {
    pub nodes: Vec<FilterNode>,
}

struct GraphBuilder {
    nodes: Vec<FilterNode>,
    current: String,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            current: SOURCE.to_string(),
        }
    }

    fn push(&mut self, inputs: Vec<String>, primitive: Primitive) -> String {
        let result = format!("n{}", self.nodes.len());
        self.nodes.push(FilterNode {
            result: result.clone(),
            inputs,
            primitive,
        });
        result
    }

    /// Append a unary node on the current buffer and advance.
    fn chain(&mut self, primitive: Primitive) {
        let input = self.current.clone();
        self.current = self.push(vec![input], primitive);
    }

    fn lower(&mut self, op: &ColorOperation) {
        match op {
            ColorOperation::Gain { r, g, b } => self.chain(Primitive::ComponentTransfer {
                function: TransferFunction::Linear {
                    slope: [*r, *g, *b],
                    intercept: [0.0; 3],
                },
            }),
            ColorOperation::Offset { amount } => self.chain(Primitive::ComponentTransfer {
                function: TransferFunction::Gamma {
                    amplitude: 1.0,
                    exponent: 1.0,
                    offset: *amount,
                },
            }),
            ColorOperation::ToneCurve { table, .. } => self.chain(Primitive::ComponentTransfer {
                function: TransferFunction::Table {
                    values: table.clone(),
                },
            }),
            ColorOperation::Matrix { matrix, .. } => self.chain(Primitive::ColorMatrix {
                values: matrix.values().to_vec(),
            }),
            ColorOperation::Blur { sigma } => {
                self.chain(Primitive::GaussianBlur { sigma: *sigma })
            }
            ColorOperation::SharpenHighpass {
                amount,
                sigma,
                blend,
            } => {
                let base = self.current.clone();
                let blurred = self.push(vec![base.clone()], Primitive::GaussianBlur { sigma: *sigma });
                let sharpened = self.push(
                    vec![base.clone(), blurred],
                    Primitive::Arithmetic {
                        k1: 0.0,
                        k2: 1.0 + amount,
                        k3: -amount,
                        k4: 0.0,
                    },
                );
                self.current = if *blend < 1.0 {
                    self.push(
                        vec![sharpened, base],
                        Primitive::Arithmetic {
                            k1: 0.0,
                            k2: *blend,
                            k3: 1.0 - blend,
                            k4: 0.0,
                        },
                    )
                } else {
                    sharpened
                };
            }
            ColorOperation::DenoiseBlend { mix, sigma } => {
                let base = self.current.clone();
                let blurred = self.push(vec![base.clone()], Primitive::GaussianBlur { sigma: *sigma });
                self.current = self.push(
                    vec![blurred, base],
                    Primitive::Arithmetic {
                        k1: 0.0,
                        k2: *mix,
                        k3: 1.0 - mix,
                        k4: 0.0,
                    },
                );
            }
            ColorOperation::GrainSynthesis { alpha, seed } => self.chain(Primitive::Grain {
                alpha: *alpha,
                seed: *seed,
            }),
            ColorOperation::Vibrance { amount } => {
                self.chain(Primitive::Vibrance { amount: *amount })
            }
        }
    }

    fn finish(mut self) -> FilterGraph {
        let input = self.current.clone();
        self.nodes.push(FilterNode {
            result: OUTPUT.to_string(),
            inputs: vec![input],
            primitive: Primitive::Merge,
        });
        FilterGraph { nodes: self.nodes }
    }
}

impl FilterGraph {
    /// Lower an operation list into graph nodes.
    pub fn from_operations(ops: &[ColorOperation]) -> Self {
        let mut builder = GraphBuilder::new();
        for op in ops {
            builder.lower(op);
        }
        builder.finish()
    }

    /// A graph that only merges the source through.
    pub fn passthrough() -> Self {
        GraphBuilder::new().finish()
    }

    pub fn is_passthrough(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].primitive == Primitive::Merge
    }

    /// Every input refers to the source or an earlier node, arities match,
    /// and the graph ends in a merge.
    pub fn validate(&self) -> bool {
        let mut known: Vec<&str> = vec![SOURCE];
        for node in &self.nodes {
            if node.inputs.len() != node.primitive.arity()
                || !node.inputs.iter().all(|i| known.contains(&i.as_str()))
            {
                return false;
            }
            known.push(&node.result);
        }
        matches!(
            self.nodes.last(),
            Some(FilterNode { primitive: Primitive::Merge, result, .. }) if result == OUTPUT
        )
    }

    /// Render as an ffmpeg `filter_complex` reading `[0:v]` and writing `[vout]`.
    pub fn to_ffmpeg(&self) -> String {
        let mut uses: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            for input in &node.inputs {
                *uses.entry(input.as_str()).or_default() += 1;
            }
        }

        let mut chains: Vec<String> = Vec::new();
        let mut pending: HashMap<String, Vec<String>> = HashMap::new();

        split_shared(SOURCE, &uses, &mut pending, &mut chains);
        for node in &self.nodes {
            let inputs: Vec<String> = node
                .inputs
                .iter()
                .map(|i| {
                    pending
                        .get_mut(i)
                        .and_then(|labels| labels.pop())
                        .unwrap_or_else(|| ffmpeg_label(i))
                })
                .collect();
            let output = if node.result == OUTPUT {
                "vout".to_string()
            } else {
                node.result.clone()
            };

            let mut chain = String::new();
            for input in &inputs {
                let _ = write!(chain, "[{input}]");
            }
            chain.push_str(&render_primitive(&node.primitive));
            let _ = write!(chain, "[{output}]");
            chains.push(chain);

            split_shared(&node.result, &uses, &mut pending, &mut chains);
        }

        chains.join(";")
    }
}

/// Emit a `split` for labels consumed more than once.
fn split_shared(
    label: &str,
    uses: &HashMap<&str, usize>,
    pending: &mut HashMap<String, Vec<String>>,
    chains: &mut Vec<String>,
) {
    let count = uses.get(label).copied().unwrap_or(0);
    if count < 2 {
        return;
    }
    let outs: Vec<String> = (0..count).map(|i| format!("{label}_{i}")).collect();
    let mut chain = format!("[{}]split={count}", ffmpeg_label(label));
    for out in &outs {
        let _ = write!(chain, "[{out}]");
    }
    chains.push(chain);
    pending.insert(label.to_string(), outs.into_iter().rev().collect());
}

fn ffmpeg_label(label: &str) -> String {
    if label == SOURCE {
        "0:v".to_string()
    } else {
        label.to_string()
    }
}

fn render_primitive(primitive: &Primitive) -> String {
    match primitive {
        Primitive::ComponentTransfer { function } => match function {
            TransferFunction::Linear { slope, intercept } => format!(
                "lutrgb=r='clip(val*{}+{}*maxval,0,maxval)':g='clip(val*{}+{}*maxval,0,maxval)':b='clip(val*{}+{}*maxval,0,maxval)'",
                num(slope[0]),
                num(intercept[0]),
                num(slope[1]),
                num(intercept[1]),
                num(slope[2]),
                num(intercept[2]),
            ),
            TransferFunction::Gamma {
                amplitude,
                exponent,
                offset,
            } => {
                let expr = format!(
                    "clip({}*pow(val/maxval,{})*maxval+{}*maxval,0,maxval)",
                    num(*amplitude),
                    num(*exponent),
                    num(*offset)
                );
                format!("lutrgb=r='{expr}':g='{expr}':b='{expr}'")
            }
            TransferFunction::Table { values } => {
                let last = values.len().saturating_sub(1).max(1) as f64;
                let points: Vec<String> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("{}/{}", num(i as f64 / last), num(*v)))
                    .collect();
                format!("curves=all='{}'", points.join(" "))
            }
        },
        Primitive::ColorMatrix { values } => {
            let v = |i: usize| values.get(i).copied().unwrap_or(0.0);
            let mut out = format!(
                "colorchannelmixer=rr={}:rg={}:rb={}:gr={}:gg={}:gb={}:br={}:bg={}:bb={}",
                num(v(0)),
                num(v(1)),
                num(v(2)),
                num(v(5)),
                num(v(6)),
                num(v(7)),
                num(v(10)),
                num(v(11)),
                num(v(12)),
            );
            // The mixer clips its sum, so constant terms ride on the opaque
            // alpha input instead of a second pass.
            let constants = [v(3) + v(4), v(8) + v(9), v(13) + v(14)];
            if constants.iter().any(|k| *k != 0.0) {
                out = format!(
                    "format=rgba,{out}:ra={}:ga={}:ba={}",
                    num(constants[0]),
                    num(constants[1]),
                    num(constants[2]),
                );
            }
            out
        }
        Primitive::GaussianBlur { sigma } => format!("gblur=sigma={}", num(*sigma)),
        Primitive::Arithmetic { k1, k2, k3, k4 } => format!(
            "blend=all_expr='clip({}*A*B/255+{}*A+{}*B+{}*255,0,255)'",
            num(*k1),
            num(*k2),
            num(*k3),
            num(*k4)
        ),
        Primitive::Grain { alpha, seed } => {
            format!("noise=alls={}:allf=t:all_seed={seed}", num(alpha * 100.0))
        }
        Primitive::Vibrance { amount } => format!("vibrance=intensity={}", num(*amount)),
        Primitive::Merge => "null".to_string(),
    }
}

/// Compact fixed-precision number.
fn num(v: f64) -> String {
    let s = format!("{:.6}", v + 0.0);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ops::MatrixStage;
    use crate::matrix::ColorMatrix;

    #[test]
    fn test_passthrough() {
        let graph = FilterGraph::passthrough();
        assert!(graph.is_passthrough());
        assert!(graph.validate());
        assert_eq!(graph.to_ffmpeg(), "[0:v]null[vout]");
    }

    #[test]
    fn test_sharpen_lowers_to_blur_and_arithmetic() {
        let graph = FilterGraph::from_operations(&[ColorOperation::SharpenHighpass {
            amount: 1.0,
            sigma: 1.5,
            blend: 1.0,
        }]);
        assert!(graph.validate());
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].primitive, Primitive::GaussianBlur { sigma: 1.5 });
        assert_eq!(graph.nodes[1].inputs, vec![SOURCE.to_string(), "n0".to_string()]);
    }

    #[test]
    fn test_ffmpeg_splits_shared_labels() {
        let graph = FilterGraph::from_operations(&[
            ColorOperation::DenoiseBlend { mix: 0.5, sigma: 0.8 },
            ColorOperation::Matrix {
                stage: MatrixStage::Profile,
                matrix: ColorMatrix::saturation(1.2),
            },
        ]);
        let filter = graph.to_ffmpeg();
        assert!(filter.starts_with("[0:v]split=2[source_0][source_1]"));
        assert!(filter.contains("gblur=sigma=0.8"));
        assert!(filter.contains("blend=all_expr"));
        assert!(filter.contains("colorchannelmixer="));
        assert!(filter.ends_with("[vout]"));
    }

    #[test]
    fn test_matrix_offsets_use_alpha_column() {
        let graph = FilterGraph::from_operations(&[ColorOperation::Matrix {
            stage: MatrixStage::Auto,
            matrix: ColorMatrix::brightness_contrast(1.0, 1.2),
        }]);
        let filter = graph.to_ffmpeg();
        assert_eq!(
            filter,
            "[0:v]format=rgba,colorchannelmixer=rr=1.2:rg=0:rb=0:gr=0:gg=1.2:gb=0:br=0:bg=0:bb=1.2\
             :ra=-0.1:ga=-0.1:ba=-0.1[n0];[n0]null[vout]"
        );
        assert!(!filter.contains("lutrgb"));
    }

    #[test]
    fn test_offset_free_matrix_skips_format() {
        let graph = FilterGraph::from_operations(&[ColorOperation::Matrix {
            stage: MatrixStage::Profile,
            matrix: ColorMatrix::saturation(1.2),
        }]);
        let filter = graph.to_ffmpeg();
        assert!(!filter.contains("format=rgba"));
        assert!(!filter.contains(":ra="));
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(2.0), "2");
        assert_eq!(num(-0.0000001), "0");
    }
}
