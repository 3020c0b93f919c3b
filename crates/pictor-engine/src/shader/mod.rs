//! Shader program construction.
//!
//! One WGSL source string per pipeline stage. Each stage is parsed and
//! validated independently (naga); the two stages are then linked on the
//! CPU: resource reflections are merged, and the vertex-output /
//! fragment-input interface is checked by location and type. Only after a
//! successful link are device shader modules created.
//!
//! The name → slot mapping produced by linking contains exactly the
//! uniforms *used* by the entry points. A uniform declared in source but
//! never referenced gets no slot; callers must tolerate absence for
//! uniforms they do not unconditionally use.
//!
//! Binding-group convention consumed by the renderer:
//! - group 0: per-frame uniforms (projection)
//! - group 1: per-draw uniforms (model matrix, tint, texture-coordinate
//!   transform), bound with dynamic offsets
//! - group 2: texture + sampler

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

mod reflect;

use reflect::{Io, collect_resources, parse_stage, stage_io, vertex_inputs};

/// One programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// WGSL source text, one string per stage.
#[derive(Debug, Copy, Clone)]
pub struct StageSources<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Shader construction errors. All setup-fatal except where a caller
/// explicitly treats a uniform as optional.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// A stage failed to parse or validate. `log` carries the annotated
    /// diagnostic pointing into the offending source.
    #[error("{stage} stage failed to compile:\n{log}")]
    StageCompile { stage: Stage, log: String },

    /// The stages compiled but do not form a consistent program.
    #[error("program link failed: {log}")]
    Link { log: String },

    /// A uniform required by the render step is absent from the program.
    #[error("uniform `{name}` not found in program")]
    UniformNotFound { name: String },
}

/// Reflected location of a uniform variable: the rewrite's "uniform
/// location". `size` is the WGSL layout size in bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub stages: wgpu::ShaderStages,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingKind {
    Texture2d,
    Sampler,
}

/// Reflected texture or sampler binding.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureSlot {
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
    pub stages: wgpu::ShaderStages,
}

/// Reflected vertex-stage input attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInput {
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub name: String,
}

/// Device-free result of compiling and linking both stages.
///
/// This is the whole contract except for the GPU objects themselves, which
/// makes the compile/link path testable without an adapter.
#[derive(Debug)]
pub struct LinkedStages {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub uniforms: BTreeMap<String, UniformSlot>,
    pub textures: BTreeMap<String, TextureSlot>,
    pub vertex_inputs: Vec<VertexInput>,
}

impl LinkedStages {
    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.get(name)
    }

    pub fn require_uniform(&self, name: &str) -> Result<&UniformSlot, ShaderError> {
        self.uniforms
            .get(name)
            .ok_or_else(|| ShaderError::UniformNotFound { name: name.to_owned() })
    }
}

/// Compiles and links both stages on the CPU.
///
/// Any stage failure aborts before linking; no partial program escapes.
pub fn link_stages(sources: &StageSources<'_>) -> Result<LinkedStages, ShaderError> {
    let vs = parse_stage(Stage::Vertex, sources.vertex)?;
    let fs = parse_stage(Stage::Fragment, sources.fragment)?;

    let mut uniforms = BTreeMap::new();
    let mut textures = BTreeMap::new();
    collect_resources(&vs, wgpu::ShaderStages::VERTEX, &mut uniforms, &mut textures)?;
    collect_resources(&fs, wgpu::ShaderStages::FRAGMENT, &mut uniforms, &mut textures)?;

    check_interface(&vs, &fs)?;

    let vertex_inputs = vertex_inputs(&vs)?;

    Ok(LinkedStages {
        vertex_entry: vs.entry_name,
        fragment_entry: fs.entry_name,
        uniforms,
        textures,
        vertex_inputs,
    })
}

/// Every fragment `@location` input must be produced by the vertex stage at
/// the same location with the same type. Extra vertex outputs are allowed.
fn check_interface(vs: &reflect::StageIr, fs: &reflect::StageIr) -> Result<(), ShaderError> {
    let outputs = stage_io(vs, Io::VertexOutputs)?;
    let inputs = stage_io(fs, Io::FragmentInputs)?;

    for (location, wanted) in &inputs {
        match outputs.get(location) {
            None => {
                return Err(ShaderError::Link {
                    log: format!(
                        "fragment stage reads location {location} ({wanted}) \
                         but the vertex stage writes no such output"
                    ),
                });
            }
            Some(produced) if produced != wanted => {
                return Err(ShaderError::Link {
                    log: format!(
                        "stage interface mismatch at location {location}: \
                         vertex writes {produced}, fragment reads {wanted}"
                    ),
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// A linked program plus its device shader modules.
///
/// The modules are owned wgpu objects, released on drop.
pub struct CompiledProgram {
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    linked: LinkedStages,
}

impl CompiledProgram {
    /// Compiles, links, and creates the device modules.
    ///
    /// The sources reaching `create_shader_module` have already passed
    /// naga validation, so device-side compilation does not fail for
    /// malformed source.
    pub fn compile(
        device: &wgpu::Device,
        label: &str,
        sources: &StageSources<'_>,
    ) -> Result<Self, ShaderError> {
        let linked = link_stages(sources)?;

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex stage")),
            source: wgpu::ShaderSource::Wgsl(sources.vertex.into()),
        });

        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fragment stage")),
            source: wgpu::ShaderSource::Wgsl(sources.fragment.into()),
        });

        Ok(Self {
            vertex_module,
            fragment_module,
            linked,
        })
    }

    pub fn vertex_module(&self) -> &wgpu::ShaderModule {
        &self.vertex_module
    }

    pub fn fragment_module(&self) -> &wgpu::ShaderModule {
        &self.fragment_module
    }

    pub fn linked(&self) -> &LinkedStages {
        &self.linked
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.linked.uniform(name)
    }

    pub fn require_uniform(&self, name: &str) -> Result<&UniformSlot, ShaderError> {
        self.linked.require_uniform(name)
    }
}
