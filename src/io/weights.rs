//! Model weights as SafeTensors

use crate::nn::Module;
use crate::{Error, Result};
use ndarray::Array1;
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::path::Path;

/// Write every parameter of `module` to a SafeTensors file
pub fn save_weights(module: &dyn Module, path: impl AsRef<Path>) -> Result<()> {
    let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = module
        .parameters()
        .into_iter()
        .map(|(name, tensor)| {
            let values = tensor.to_vec();
            let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
            (name, bytes, vec![values.len()])
        })
        .collect();

    let views = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| Error::Serialization(format!("invalid tensor '{name}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = HashMap::new();
    metadata.insert("module".to_string(), module.name().to_string());

    let bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path, bytes)?;

    Ok(())
}

/// Copy weights from a SafeTensors file into `module`
///
/// Every parameter of the module must be present with a matching length;
/// nothing is written unless all of them are.
pub fn load_weights(module: &dyn Module, path: impl AsRef<Path>) -> Result<()> {
    let data = std::fs::read(path)?;
    let tensors = safetensors::SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let mut staged = Vec::new();
    for (name, param) in module.parameters() {
        let view = tensors.tensor(&name).map_err(|_| {
            Error::CheckpointMismatch(format!("parameter '{name}' missing from weights file"))
        })?;
        if view.dtype() != Dtype::F32 {
            return Err(Error::CheckpointMismatch(format!(
                "parameter '{name}' is {:?}, expected F32",
                view.dtype()
            )));
        }
        // the buffer may not be 4-byte aligned
        let values: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect();
        if values.len() != param.len() {
            return Err(Error::CheckpointMismatch(format!(
                "parameter '{name}' has {} values, weights file has {}",
                param.len(),
                values.len()
            )));
        }
        staged.push((param, values));
    }

    for (param, values) in staged {
        param.set_data(Array1::from(values))?;
    }
    Ok(())
}
