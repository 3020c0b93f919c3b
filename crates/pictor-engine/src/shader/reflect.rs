//! naga-based reflection over a single parsed shader stage.
//!
//! Everything here runs on the CPU with no device, so the whole
//! compile-and-link front half of the pipeline is unit-testable.

use std::collections::BTreeMap;

use super::{BindingKind, ShaderError, Stage, TextureSlot, UniformSlot, VertexInput};

/// Parsed, validated IR for one stage plus its entry point.
pub(super) struct StageIr {
    pub module: naga::Module,
    pub info: naga::valid::ModuleInfo,
    pub entry_index: usize,
    pub entry_name: String,
}

pub(super) fn parse_stage(stage: Stage, source: &str) -> Result<StageIr, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::StageCompile {
        stage,
        log: e.emit_to_string(source),
    })?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::StageCompile {
        stage,
        log: e.emit_to_string(source),
    })?;

    let want = match stage {
        Stage::Vertex => naga::ShaderStage::Vertex,
        Stage::Fragment => naga::ShaderStage::Fragment,
    };

    let entry_index = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == want)
        .ok_or_else(|| ShaderError::StageCompile {
            stage,
            log: format!("source declares no {stage} entry point"),
        })?;

    let entry_name = module.entry_points[entry_index].name.clone();

    Ok(StageIr {
        module,
        info,
        entry_index,
        entry_name,
    })
}

/// Collects the resources *used* by the stage's entry point into the shared
/// maps, merging with what the other stage already contributed.
///
/// Declared-but-unused globals are skipped, mirroring drivers that assign no
/// location to optimized-out uniforms. A name reflected by both stages must
/// agree on group/binding/size, otherwise the stages do not link.
pub(super) fn collect_resources(
    ir: &StageIr,
    visibility: wgpu::ShaderStages,
    uniforms: &mut BTreeMap<String, UniformSlot>,
    textures: &mut BTreeMap<String, TextureSlot>,
) -> Result<(), ShaderError> {
    let ep_info = ir.info.get_entry_point(ir.entry_index);

    for (handle, var) in ir.module.global_variables.iter() {
        if ep_info[handle].is_empty() {
            continue;
        }
        let Some(name) = var.name.as_deref() else { continue };

        match var.space {
            naga::AddressSpace::Uniform => {
                let Some(rb) = &var.binding else { continue };
                let size = ir.module.types[var.ty].inner.size(ir.module.to_ctx());
                let slot = UniformSlot {
                    group: rb.group,
                    binding: rb.binding,
                    size,
                    stages: visibility,
                };
                merge_uniform(uniforms, name, slot)?;
            }
            naga::AddressSpace::Handle => {
                let Some(rb) = &var.binding else { continue };
                let kind = match &ir.module.types[var.ty].inner {
                    naga::TypeInner::Image { .. } => BindingKind::Texture2d,
                    naga::TypeInner::Sampler { .. } => BindingKind::Sampler,
                    _ => continue,
                };
                let slot = TextureSlot {
                    group: rb.group,
                    binding: rb.binding,
                    kind,
                    stages: visibility,
                };
                merge_texture(textures, name, slot)?;
            }
            _ => {}
        }
    }

    Ok(())
}

fn merge_uniform(
    map: &mut BTreeMap<String, UniformSlot>,
    name: &str,
    slot: UniformSlot,
) -> Result<(), ShaderError> {
    if let Some(existing) = map.get_mut(name) {
        if (existing.group, existing.binding, existing.size)
            != (slot.group, slot.binding, slot.size)
        {
            return Err(ShaderError::Link {
                log: format!(
                    "uniform `{name}` declared inconsistently across stages: \
                     group {}/binding {}/{}B vs group {}/binding {}/{}B",
                    existing.group, existing.binding, existing.size,
                    slot.group, slot.binding, slot.size
                ),
            });
        }
        existing.stages |= slot.stages;
    } else {
        map.insert(name.to_owned(), slot);
    }
    Ok(())
}

fn merge_texture(
    map: &mut BTreeMap<String, TextureSlot>,
    name: &str,
    slot: TextureSlot,
) -> Result<(), ShaderError> {
    if let Some(existing) = map.get_mut(name) {
        if (existing.group, existing.binding, existing.kind)
            != (slot.group, slot.binding, slot.kind)
        {
            return Err(ShaderError::Link {
                log: format!("binding `{name}` declared inconsistently across stages"),
            });
        }
        existing.stages |= slot.stages;
    } else {
        map.insert(name.to_owned(), slot);
    }
    Ok(())
}

/// Reflects the vertex entry point's `@location` inputs.
pub(super) fn vertex_inputs(ir: &StageIr) -> Result<Vec<VertexInput>, ShaderError> {
    let func = &ir.module.entry_points[ir.entry_index].function;
    let mut inputs = Vec::new();

    for arg in &func.arguments {
        flatten_io(
            &ir.module,
            arg.ty,
            arg.binding.as_ref(),
            arg.name.as_deref(),
            &mut |location, inner, name| {
                let format = vertex_format(inner).ok_or_else(|| ShaderError::Link {
                    log: format!(
                        "vertex input `{}` at location {location} has unsupported type {}",
                        name.unwrap_or("<anonymous>"),
                        type_label(inner)
                    ),
                })?;
                inputs.push(VertexInput {
                    location,
                    format,
                    name: name.unwrap_or("<anonymous>").to_owned(),
                });
                Ok(())
            },
        )?;
    }

    inputs.sort_by_key(|i| i.location);
    Ok(inputs)
}

/// Location → type-label map for one side of the stage interface.
///
/// `Io::VertexOutputs` walks the vertex entry's result, `Io::FragmentInputs`
/// the fragment entry's arguments. Builtins are skipped on both sides.
pub(super) enum Io {
    VertexOutputs,
    FragmentInputs,
}

pub(super) fn stage_io(ir: &StageIr, side: Io) -> Result<BTreeMap<u32, String>, ShaderError> {
    let func = &ir.module.entry_points[ir.entry_index].function;
    let mut map = BTreeMap::new();

    let mut record = |location: u32, inner: &naga::TypeInner, _name: Option<&str>| {
        map.insert(location, type_label(inner));
        Ok(())
    };

    match side {
        Io::VertexOutputs => {
            if let Some(result) = &func.result {
                flatten_io(&ir.module, result.ty, result.binding.as_ref(), None, &mut record)?;
            }
        }
        Io::FragmentInputs => {
            for arg in &func.arguments {
                flatten_io(&ir.module, arg.ty, arg.binding.as_ref(), arg.name.as_deref(), &mut record)?;
            }
        }
    }

    Ok(map)
}

/// Walks one IO argument/result, descending into structs, and calls `f` for
/// every `@location`-bound leaf.
fn flatten_io(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    name: Option<&str>,
    f: &mut dyn FnMut(u32, &naga::TypeInner, Option<&str>) -> Result<(), ShaderError>,
) -> Result<(), ShaderError> {
    let inner = &module.types[ty].inner;

    match binding {
        Some(naga::Binding::Location { location, .. }) => f(*location, inner, name),
        Some(naga::Binding::BuiltIn(_)) => Ok(()),
        None => {
            if let naga::TypeInner::Struct { members, .. } = inner {
                for member in members {
                    flatten_io(module, member.ty, member.binding.as_ref(), member.name.as_deref(), f)?;
                }
            }
            Ok(())
        }
    }
}

fn vertex_format(inner: &naga::TypeInner) -> Option<wgpu::VertexFormat> {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match inner {
        TypeInner::Scalar(s) if s.width == 4 => match s.kind {
            ScalarKind::Float => Some(wgpu::VertexFormat::Float32),
            ScalarKind::Sint => Some(wgpu::VertexFormat::Sint32),
            ScalarKind::Uint => Some(wgpu::VertexFormat::Uint32),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.width == 4 => {
            let n = match size {
                VectorSize::Bi => 2,
                VectorSize::Tri => 3,
                VectorSize::Quad => 4,
            };
            match (scalar.kind, n) {
                (ScalarKind::Float, 2) => Some(wgpu::VertexFormat::Float32x2),
                (ScalarKind::Float, 3) => Some(wgpu::VertexFormat::Float32x3),
                (ScalarKind::Float, 4) => Some(wgpu::VertexFormat::Float32x4),
                (ScalarKind::Sint, 2) => Some(wgpu::VertexFormat::Sint32x2),
                (ScalarKind::Sint, 3) => Some(wgpu::VertexFormat::Sint32x3),
                (ScalarKind::Sint, 4) => Some(wgpu::VertexFormat::Sint32x4),
                (ScalarKind::Uint, 2) => Some(wgpu::VertexFormat::Uint32x2),
                (ScalarKind::Uint, 3) => Some(wgpu::VertexFormat::Uint32x3),
                (ScalarKind::Uint, 4) => Some(wgpu::VertexFormat::Uint32x4),
                _ => None,
            }
        }
        _ => None,
    }
}

fn type_label(inner: &naga::TypeInner) -> String {
    use naga::{ScalarKind, TypeInner, VectorSize};

    let scalar_label = |s: &naga::Scalar| match (s.kind, s.width) {
        (ScalarKind::Float, 4) => "f32".to_owned(),
        (ScalarKind::Sint, 4) => "i32".to_owned(),
        (ScalarKind::Uint, 4) => "u32".to_owned(),
        (ScalarKind::Bool, _) => "bool".to_owned(),
        (kind, width) => format!("{kind:?}{}", width * 8),
    };

    match inner {
        TypeInner::Scalar(s) => scalar_label(s),
        TypeInner::Vector { size, scalar } => {
            let n = match size {
                VectorSize::Bi => 2,
                VectorSize::Tri => 3,
                VectorSize::Quad => 4,
            };
            format!("vec{n}<{}>", scalar_label(scalar))
        }
        TypeInner::Matrix { columns, rows, scalar } => {
            let c = *columns as u8;
            let r = *rows as u8;
            format!("mat{c}x{r}<{}>", scalar_label(scalar))
        }
        other => format!("{other:?}"),
    }
}
