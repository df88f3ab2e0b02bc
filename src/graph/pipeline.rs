//! Pipeline Compiler
//!
//! Turns one parsed pass source into GPU objects: assembles each shader's
//! final text (resolved externals on top, root-signature attribute at the
//! bottom), compiles the blobs, derives the root signature from the first
//! blob, builds the vertex input layout and creates the PSO.
//!
//! Every produced object receives a debug name of the form
//! `"<kind>, pass: <name>"`.

use rustc_hash::FxHashMap;

use crate::errors::{CinderError, Result};
use crate::frontend::pass_source::{PassParametersSource, VertAttrDecl};
use crate::graph::resources::{ResourceContent, ResourceDecl};
use crate::rhi::device::RenderDevice;
use crate::rhi::types::{
    Format, GraphicsPipelineDesc, InputElement, InputLayout, PipelineId, RootSignatureId,
    ShaderBlob, ShaderStage, Viewport,
};

/// Color-target format of every pass.
const COLOR_TARGET_FORMAT: Format = Format::Rgba8Unorm;
/// Depth-target format of every pass.
const DEPTH_TARGET_FORMAT: Format = Format::D24UnormS8Uint;

/// GPU objects produced for one pass.
#[derive(Debug)]
pub struct CompiledPipeline {
    pub pipeline: PipelineId,
    pub root_signature: RootSignatureId,
    pub input_layout: InputLayout,
    pub viewport: Viewport,
}

/// Compiles the shaders, root signature, input layout and PSO of one pass.
///
/// `draw_area` is the current draw-area size; viewport fractions are
/// resolved against it here, which makes the compiled graph dependent on
/// the window size; a resize requires a rebuild.
pub fn compile_pass(
    device: &dyn RenderDevice,
    source: &PassParametersSource,
    draw_area: (u32, u32),
) -> Result<CompiledPipeline> {
    let blobs = compile_shaders(device, source)?;

    let first = blobs.first().ok_or_else(|| CinderError::InvalidPassSource {
        file: source.name.clone(),
        line: 0,
        column: 0,
        message: "pass declares no shaders".to_string(),
    })?;

    let root_signature = device
        .create_root_signature(first, &format!("root signature, pass: {}", source.name))
        .map_err(|message| CinderError::PipelineCreateError {
            pass: source.name.clone(),
            message,
        })?;

    let input_layout = build_input_layout(source)?;
    let viewport = resolve_viewport(source, draw_area);

    let vs = blobs
        .iter()
        .find(|blob| blob.stage == ShaderStage::Vs)
        .cloned()
        .ok_or_else(|| CinderError::InvalidPassSource {
            file: source.name.clone(),
            line: 0,
            column: 0,
            message: "pass declares no vertex shader".to_string(),
        })?;
    let gs = blobs.iter().find(|b| b.stage == ShaderStage::Gs).cloned();
    let ps = blobs.iter().find(|b| b.stage == ShaderStage::Ps).cloned();

    let desc = GraphicsPipelineDesc {
        root_signature,
        vs,
        gs,
        ps,
        input_layout: input_layout.clone(),
        topology_type: source.topology.topology_type(),
        color_format: COLOR_TARGET_FORMAT,
        depth_format: DEPTH_TARGET_FORMAT,
        blend: source.blend,
        depth_write: source.depth_write,
        viewport,
    };

    let pipeline = device
        .create_graphics_pipeline(&desc, &format!("PSO, pass: {}", source.name))
        .map_err(|message| CinderError::PipelineCreateError {
            pass: source.name.clone(),
            message,
        })?;

    Ok(CompiledPipeline {
        pipeline,
        root_signature,
        input_layout,
        viewport,
    })
}

// ============================================================================
// Shader assembly
// ============================================================================

/// Compiles every shader of the pass, in declaration order.
fn compile_shaders(
    device: &dyn RenderDevice,
    source: &PassParametersSource,
) -> Result<Vec<ShaderBlob>> {
    let mut blobs = Vec::with_capacity(source.shaders.len());
    for shader in &source.shaders {
        let assembled = assemble_shader_source(source, shader.stage, &shader.externals, &shader.source)?;
        let blob = device
            .compile_shader(
                shader.stage,
                &assembled,
                &format!("shader, pass: {}", source.name),
            )
            .map_err(|log| {
                log::error!(
                    "shader compilation failed in pass '{}' ({}): {log}",
                    source.name,
                    shader.stage.profile()
                );
                CinderError::ShaderCompileError {
                    pass: source.name.clone(),
                    log,
                }
            })?;
        blobs.push(blob);
    }
    Ok(blobs)
}

/// Builds the final shader text: resolved externals, the pass-authored
/// body, then the root-signature attribute.
fn assemble_shader_source(
    source: &PassParametersSource,
    stage: ShaderStage,
    externals: &[String],
    body: &str,
) -> Result<String> {
    let mut text = String::new();
    for external in externals {
        let snippet = resolve_external(source, external).ok_or_else(|| {
            CinderError::InvalidPassSource {
                file: source.name.clone(),
                line: 0,
                column: 0,
                message: format!(
                    "{} shader references external '{external}', which is neither a \
                     resource, a vertex-attribute declaration nor a function",
                    stage.profile()
                ),
            }
        })?;
        text.push_str(&snippet);
        text.push('\n');
    }
    text.push_str(body);
    text.push('\n');
    text.push_str(&format!("[RootSignature(\"{}\")]\n", source.root_sig_text));
    Ok(text)
}

/// Finds what an external name refers to and renders its HLSL form.
fn resolve_external(source: &PassParametersSource, name: &str) -> Option<String> {
    if let Some(resource) = source
        .resources
        .iter()
        .find(|r| r.name().text() == name)
    {
        return Some(resource_hlsl(resource));
    }
    if let Some(decl) = source.vert_attr_decls.iter().find(|d| d.name == name) {
        return Some(vert_attr_hlsl(decl));
    }
    source
        .functions
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.source.clone())
}

fn resource_hlsl(resource: &ResourceDecl) -> String {
    match &resource.content {
        ResourceContent::ConstBuffer(cb) => {
            let mut text = format!("cbuffer {} : register(b{})\n{{\n", cb.name, cb.register);
            for field in &cb.fields {
                text.push_str(&format!("    {} {};\n", field.ty.hlsl(), field.name));
            }
            text.push_str("};");
            text
        }
        ResourceContent::Texture(t) => {
            format!("Texture2D {} : register(t{});", t.name, t.register)
        }
        ResourceContent::Sampler(s) => {
            format!("SamplerState {} : register(s{});", s.name, s.register)
        }
    }
}

fn vert_attr_hlsl(decl: &VertAttrDecl) -> String {
    let mut text = format!("struct {}\n{{\n", decl.name);
    for field in &decl.fields {
        text.push_str(&format!(
            "    {} {} : {};\n",
            field.ty.hlsl(),
            field.name,
            field.semantic
        ));
    }
    text.push_str("};");
    text
}

// ============================================================================
// Input layout
// ============================================================================

/// Derives the input layout from the pass's selected vertex-attribute
/// declaration: fields in declaration order, slot 0 unless remapped via
/// `vertAttrSlots`, offsets accumulated per slot.
fn build_input_layout(source: &PassParametersSource) -> Result<InputLayout> {
    let decl = source.selected_vert_attr()?;
    let mut offsets: FxHashMap<u32, u32> = FxHashMap::default();
    let mut elements = Vec::with_capacity(decl.fields.len());

    for field in &decl.fields {
        let format = field.ty.vertex_format().ok_or_else(|| {
            CinderError::InvalidPassSource {
                file: source.name.clone(),
                line: 0,
                column: 0,
                message: format!(
                    "vertex-attribute field '{}' has type {}, which cannot feed \
                     the input assembler",
                    field.name,
                    field.ty.hlsl()
                ),
            }
        })?;
        let slot = source
            .vert_attr_slots
            .get(&field.name.hash())
            .copied()
            .unwrap_or(0);
        let offset = offsets.entry(slot).or_insert(0);
        elements.push(InputElement {
            semantic: field.semantic.clone(),
            format,
            slot,
            byte_offset: *offset,
        });
        *offset += field.ty.byte_size();
    }

    Ok(InputLayout { elements })
}

/// Resolves the viewport against the current draw area.
fn resolve_viewport(source: &PassParametersSource, draw_area: (u32, u32)) -> Viewport {
    Viewport {
        x: source.viewport[0].resolve(draw_area.0),
        y: source.viewport[1].resolve(draw_area.1),
        width: source.viewport[2].resolve(draw_area.0),
        height: source.viewport[3].resolve(draw_area.1),
    }
}
