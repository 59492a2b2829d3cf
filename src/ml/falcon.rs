// ============================================================
// Layer 5 — FALCON Conversion
// ============================================================
// Turns a trained standard network into its FALCON form:
//
//   StandardConv  → FALCON
//   StConvBranch  → FALCONBranch   (both paths)
//   anything else → unchanged
//
// With `init`, the new weights start from the old kernels.
// For every output channel o the 3x3 kernel K_o is an
// (in x 9) matrix; its rank-r approximation
//
//   K_o ≈ Σ_r σ_r · u_r · v_rᵀ
//
// gives pointwise weights P_r[o, :] = σ_r · u_r and depthwise
// weights D_r[o, :] = v_r, because pointwise-then-depthwise
// computes exactly the kernel P[o, i] · D[o, h, w].
// The singular triplets come from power iteration on K_oᵀ K_o
// (9x9) with deflation, so no linear-algebra crate is needed.
//
// Reference: Jang et al. (2020) FALCON, §3.2

use burn::{module::Param, prelude::*};

use crate::ml::conv::{
    ConvShape, ConvUnit, FalconBranch, FalconConv, FalconOptions, StConvBranch, StandardConv,
};
use crate::ml::model::Network;

const POWER_ITERATIONS: usize = 500;
const SINGULAR_EPS:     f64   = 1e-10;

// ─── Decomposition ────────────────────────────────────────────────────────────
/// One rank-1 term of every output channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RankTerm {
    /// [out * in], row per output channel
    pub pointwise: Vec<f32>,
    /// [out * kernel_area]
    pub depthwise: Vec<f32>,
    /// false where the channel had no energy left at this rank
    pub active:    Vec<bool>,
}

/// Top singular triplet (σ, u, v) of a row-major `rows x cols` matrix.
fn top_singular(m: &[f64], rows: usize, cols: usize) -> (f64, Vec<f64>, Vec<f64>) {
    // G = MᵀM
    let mut gram = vec![0.0; cols * cols];
    for r in 0..rows {
        let row = &m[r * cols..(r + 1) * cols];
        for a in 0..cols {
            for b in 0..cols {
                gram[a * cols + b] += row[a] * row[b];
            }
        }
    }

    // uneven start so no eigenvector is orthogonal to it by symmetry
    let mut v: Vec<f64> = (0..cols).map(|j| 1.0 + j as f64 * 0.1).collect();
    for _ in 0..POWER_ITERATIONS {
        let w: Vec<f64> = (0..cols)
            .map(|a| (0..cols).map(|b| gram[a * cols + b] * v[b]).sum())
            .collect();
        let norm = w.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < SINGULAR_EPS {
            return (0.0, vec![0.0; rows], vec![0.0; cols]);
        }
        let delta: f64 = w.iter().zip(&v).map(|(a, b)| (a / norm - b).abs()).sum();
        v = w.into_iter().map(|x| x / norm).collect();
        if delta < 1e-12 {
            break;
        }
    }

    let mv: Vec<f64> = (0..rows)
        .map(|r| (0..cols).map(|c| m[r * cols + c] * v[c]).sum())
        .collect();
    let sigma = mv.iter().map(|x| x * x).sum::<f64>().sqrt();
    if sigma < SINGULAR_EPS {
        return (0.0, vec![0.0; rows], v);
    }
    let u = mv.into_iter().map(|x| x / sigma).collect();
    (sigma, u, v)
}

/// Rank-`rank` pointwise/depthwise factors of a conv kernel laid out
/// as [out, in, kh, kw].
pub fn decompose_kernel(kernel: &[f32], dims: [usize; 4], rank: usize) -> Vec<RankTerm> {
    let [out, inp, kh, kw] = dims;
    let area = kh * kw;

    let mut terms: Vec<RankTerm> = (0..rank)
        .map(|_| RankTerm {
            pointwise: vec![0.0; out * inp],
            depthwise: vec![0.0; out * area],
            active:    vec![false; out],
        })
        .collect();

    for o in 0..out {
        let mut m: Vec<f64> = kernel[o * inp * area..(o + 1) * inp * area]
            .iter()
            .map(|&x| x as f64)
            .collect();

        for term in terms.iter_mut() {
            let (sigma, u, v) = top_singular(&m, inp, area);
            if sigma < SINGULAR_EPS {
                break;
            }
            for i in 0..inp {
                term.pointwise[o * inp + i] = (sigma * u[i]) as f32;
                for j in 0..area {
                    m[i * area + j] -= sigma * u[i] * v[j];
                }
            }
            for j in 0..area {
                term.depthwise[o * area + j] = v[j] as f32;
            }
            term.active[o] = true;
        }
    }
    terms
}

fn tensor_values<B: Backend>(tensor: Tensor<B, 4>) -> Option<Vec<f32>> {
    match tensor.into_data().convert::<f32>().to_vec::<f32>() {
        Ok(values) => Some(values),
        Err(e) => {
            tracing::warn!("Cannot read weights for FALCON init: {:?}", e);
            None
        }
    }
}

/// `fresh` with the rows of active channels replaced by `rows`.
fn merge_rows<B: Backend>(
    fresh:  &Param<Tensor<B, 4>>,
    rows:   &[f32],
    active: &[bool],
    device: &B::Device,
) -> Param<Tensor<B, 4>> {
    let tensor = fresh.val();
    let dims   = tensor.dims();
    let Some(mut values) = tensor_values(tensor) else {
        return fresh.clone();
    };
    let width = values.len() / active.len().max(1);
    for (o, _) in active.iter().enumerate().filter(|(_, a)| **a) {
        values[o * width..(o + 1) * width].copy_from_slice(&rows[o * width..(o + 1) * width]);
    }
    Param::from_tensor(Tensor::from_data(TensorData::new(values, dims), device))
}

// ─── Conversion ───────────────────────────────────────────────────────────────
impl<B: Backend> StandardConv<B> {
    /// FALCON replacement of this conv; keeps the output BatchNorm.
    pub fn to_falcon(&self, opts: FalconOptions, init: bool, device: &B::Device) -> FalconConv<B> {
        let weight = self.conv.weight.val();
        let [out, inp, kh, kw] = weight.dims();
        let mut falcon = FalconConv::new(ConvShape::new(inp, out, self.stride), opts, device);
        falcon.bn = self.bn.clone();

        if !init {
            return falcon;
        }
        if opts.groups > 1 {
            tracing::warn!("FALCON init needs ungrouped pointwise convs, keeping random weights");
            return falcon;
        }
        let Some(kernel) = tensor_values(weight) else {
            return falcon;
        };

        let terms = decompose_kernel(&kernel, [out, inp, kh, kw], falcon.paths.len());
        for (path, term) in falcon.paths.iter_mut().zip(&terms) {
            path.pointwise.weight = merge_rows(&path.pointwise.weight, &term.pointwise, &term.active, device);
            path.depthwise.weight = merge_rows(&path.depthwise.weight, &term.depthwise, &term.active, device);
        }
        falcon
    }
}

impl<B: Backend> StConvBranch<B> {
    pub fn to_falcon(&self, opts: FalconOptions, init: bool, device: &B::Device) -> FalconBranch<B> {
        FalconBranch {
            main:  self.main.to_falcon(opts, init, device),
            side:  self.side.to_falcon(opts, init, device),
            alpha: self.alpha.clone(),
        }
    }
}

impl<B: Backend> ConvUnit<B> {
    pub fn into_falcon(self, opts: FalconOptions, init: bool, device: &B::Device) -> Self {
        match self {
            Self::Standard(u)     => Self::Falcon(u.to_falcon(opts, init, device)),
            Self::StConvBranch(u) => Self::FalconBranch(u.to_falcon(opts, init, device)),
            other                 => other,
        }
    }
}

impl<B: Backend> Network<B> {
    /// Convert every unit to its FALCON counterpart. The stem stays standard.
    pub fn falcon(self, opts: FalconOptions, init: bool, device: &B::Device) -> Self {
        let before = self.num_params();
        let network = self.map_units(|unit| unit.into_falcon(opts, init, device));
        tracing::info!(
            "FALCON conversion (rank={}, groups={}, init={}): {} → {} parameters",
            opts.rank,
            opts.groups,
            init,
            before,
            network.num_params(),
        );
        network
    }
}
