//! Frame-Graph Compiler Tests
//!
//! End-to-end builds through the real grammar files against the headless
//! null device:
//! - single-UI-pass build with global/per-object argument routing
//! - global resource deduplication and collision detection
//! - descriptor-table scope/frequency validation
//! - include preprocessing through the builder
//! - rebuild idempotence and hot reload with a failing rebuild
//! - per-frame execution and the recorded command stream

use std::path::PathBuf;

use cinder::graph::passes::{DrawObject, VertexSource};
use cinder::rhi::null::RecordedCommand;
use cinder::{
    CinderError, FrameDrawLists, FrameGraph, FrameGraphBuilder, FrameGraphWatcher, FrameMemory,
    NullDevice, PassInput, RecordingCommandList, RendererConfig, RendererHost, ScenePass,
    name_hash,
};
use rustc_hash::FxHashMap;

// ============================================================================
// Fixtures
// ============================================================================

const UI_PASS: &str = r"
input UI

vertAttr UiLayout

VertAttr UiLayout
{
    float4 position : POSITION,
    float2 uv : TEXCOORD
}

state
{
    colorTarget : BACK_BUFFER
    depthTarget : BACK_BUFFER_DEPTH
    viewport : 0.0, 0.0, 1.0, 1.0
    blendEnabled : true
    srcBlend : SrcAlpha
    destBlend : InvSrcAlpha
    depthWriteMask : false
    topology : TriangleList
}

Resource <Global, PerPass> ConstBuffer Tint : register(b0)
{
    float4 color;
}

Resource <Local, PerObject> ConstBuffer Placement : register(b1)
{
    float4 pos;
    float4 scale;
}

RootSig
{
    CBV(b0),
    CBV(b1)
}

Shader : Vs
External : Tint, Placement, UiLayout
<[
float4 main(UiLayout vertex) : SV_POSITION
{
    return vertex.position * scale + pos + color;
}
]>

Shader : Ps
<[
float4 main() : SV_TARGET
{
    return float4(1.0, 1.0, 1.0, 1.0);
}
]>
";

const CAM_RESOURCE: &str = r"
Resource <Global, PerPass> ConstBuffer Cam : register(b0)
{
    float4x4 view;
}
";

fn static_pass(cam_resource: &str) -> String {
    format!(
        r"
input Static

vertAttr WorldLayout

VertAttr WorldLayout
{{
    float3 position : POSITION,
    float3 normal : NORMAL
}}

{cam_resource}

RootSig
{{
    CBV(b0)
}}

Shader : Vs
External : Cam, WorldLayout
<[
float4 main(WorldLayout vertex) : SV_POSITION
{{
    return mul(view, float4(vertex.position, 1.0));
}}
]>
"
    )
}

struct Fixture {
    dir: PathBuf,
    config: RendererConfig,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = std::env::temp_dir().join(format!("cinder-fg-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let config = RendererConfig {
            grammar_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/grammars")),
            frame_graph_dir: dir.clone(),
            ..RendererConfig::default()
        };
        Self { dir, config }
    }

    fn write(&self, file: &str, content: &str) -> &Self {
        std::fs::write(self.dir.join(file), content).unwrap();
        self
    }

    fn build(&self) -> cinder::Result<FrameGraph> {
        let device = NullDevice::new();
        FrameGraphBuilder::new(self.config.clone())?.build(&device, (800, 600))
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

// ============================================================================
// Single UI pass
// ============================================================================

#[test]
fn single_ui_pass_builds() {
    let fixture = Fixture::new("single-ui");
    fixture
        .write("ui.pass", UI_PASS)
        .write("main.framegraph", "ui\n");

    let graph = fixture.build().unwrap();
    assert_eq!(graph.pass_count(), 1);
    assert!(matches!(graph.passes()[0], ScenePass::Ui(_)));
    assert_eq!(graph.passes_global_res.len(), 1);

    let params = &graph.passes()[0].core().params;
    assert_eq!(params.per_object_local_template.len(), 1);
    assert_eq!(params.pass_global_indices.as_slice(), &[0]);
    assert!(params.pass_local.is_empty());

    // Every root parameter index is covered by exactly one argument.
    let mut bind_indices: Vec<u32> = params
        .per_object_local_template
        .iter()
        .map(cinder::RootArg::bind_index)
        .chain(
            params
                .pass_global_indices
                .iter()
                .map(|&i| graph.passes_global_res[i].bind_index()),
        )
        .collect();
    bind_indices.sort_unstable();
    assert_eq!(bind_indices, vec![0, 1]);
}

#[test]
fn viewport_fraction_resolves_against_draw_area() {
    let fixture = Fixture::new("viewport");
    fixture
        .write("ui.pass", UI_PASS)
        .write("main.framegraph", "ui\n");
    let graph = fixture.build().unwrap();
    let viewport = graph.passes()[0].core().params.viewport;
    assert_eq!(viewport.width, 800.0);
    assert_eq!(viewport.height, 600.0);
}

// ============================================================================
// Global resource deduplication / collisions
// ============================================================================

#[test]
fn equal_global_resources_share_one_entry() {
    let fixture = Fixture::new("dedup");
    fixture
        .write("opaque.pass", &static_pass(CAM_RESOURCE))
        .write("sky.pass", &static_pass(CAM_RESOURCE))
        .write("main.framegraph", "opaque\nsky\n");

    let graph = fixture.build().unwrap();
    assert_eq!(graph.pass_count(), 2);
    assert_eq!(graph.passes_global_res.len(), 1);
    let first = graph.passes()[0].core().params.pass_global_indices.clone();
    let second = graph.passes()[1].core().params.pass_global_indices.clone();
    assert_eq!(first, second);
}

#[test]
fn mismatched_global_structure_is_a_collision() {
    let other_cam = r"
Resource <Global, PerPass> ConstBuffer Cam : register(b0)
{
    float4x4 proj;
}
";
    let fixture = Fixture::new("collision");
    fixture
        .write("opaque.pass", &static_pass(CAM_RESOURCE))
        .write("sky.pass", &static_pass(other_cam))
        .write("main.framegraph", "opaque\nsky\n");

    let err = fixture.build().unwrap_err();
    assert!(matches!(err, CinderError::ResourceNameCollision(_)));
}

// ============================================================================
// Descriptor tables
// ============================================================================

fn textured_pass(sampler_frequency: &str) -> String {
    format!(
        r"
input Dynamic

vertAttr WorldLayout

VertAttr WorldLayout
{{
    float3 position : POSITION,
    float2 uv : TEXCOORD
}}

Resource <Local, PerObject> Texture diffuseMap : register(t0)
Resource <Local, {sampler_frequency}> Sampler linearSampler : register(s0)

RootSig
{{
    DescTable(SRV(t0), Sampler(s0))
}}

Shader : Vs
External : WorldLayout
<[
float4 main(WorldLayout vertex) : SV_POSITION
{{
    return float4(vertex.position, 1.0);
}}
]>

Shader : Ps
External : diffuseMap, linearSampler
<[
float4 main(float2 uv : TEXCOORD) : SV_TARGET
{{
    return diffuseMap.Sample(linearSampler, uv);
}}
]>
"
    )
}

#[test]
fn desc_table_with_uniform_tags_builds() {
    let fixture = Fixture::new("table-ok");
    fixture
        .write("entities.pass", &textured_pass("PerObject"))
        .write("main.framegraph", "entities\n");

    let graph = fixture.build().unwrap();
    let params = &graph.passes()[0].core().params;
    assert_eq!(params.per_object_local_template.len(), 1);
}

#[test]
fn desc_table_mixing_frequencies_fails() {
    let fixture = Fixture::new("table-mixed");
    fixture
        .write("entities.pass", &textured_pass("PerPass"))
        .write("main.framegraph", "entities\n");

    let err = fixture.build().unwrap_err();
    assert!(matches!(err, CinderError::DescTableMixedFrequency(_)));
}

// ============================================================================
// Preprocessor through the builder
// ============================================================================

#[test]
fn includes_are_expanded_before_parsing() {
    let with_include = r"
input UI

vertAttr UiLayout

VertAttr UiLayout
{
    float4 position : POSITION
}

#include <common.inc>

RootSig
{
    CBV(b0)
}

Resource <Local, PerPass> ConstBuffer Frame : register(b0)
{
    float time;
}

Shader : Vs
External : Frame, UiLayout, Wobble
<[
float4 main(UiLayout vertex) : SV_POSITION
{
    return Wobble(vertex.position, time);
}
]>
";
    let common = r"
Function Wobble
<[
float4 Wobble(float4 p, float t) { return p + sin(t); }
]>
";
    let fixture = Fixture::new("include");
    fixture
        .write("ui.pass", with_include)
        .write("common.inc", common)
        .write("main.framegraph", "ui\n");

    let graph = fixture.build().unwrap();
    assert_eq!(graph.pass_count(), 1);
}

// ============================================================================
// Error surfaces
// ============================================================================

#[test]
fn missing_frame_graph_file_is_config_missing() {
    let fixture = Fixture::new("no-framegraph");
    fixture.write("ui.pass", UI_PASS);
    let err = fixture.build().unwrap_err();
    assert!(matches!(err, CinderError::ConfigMissing(_)));
}

#[test]
fn missing_pass_file_is_config_missing() {
    let fixture = Fixture::new("no-pass");
    fixture.write("main.framegraph", "ghost\n");
    let err = fixture.build().unwrap_err();
    assert!(matches!(err, CinderError::ConfigMissing(_)));
}

#[test]
fn parse_error_reports_line_and_column() {
    let fixture = Fixture::new("parse-error");
    fixture
        .write("ui.pass", "input UI\nvertAttr UiLayout\nstate { nonsense }\n")
        .write("main.framegraph", "ui\n");
    let err = fixture.build().unwrap_err();
    match err {
        CinderError::InvalidPassSource { line, .. } => assert_eq!(line, 3),
        other => panic!("expected InvalidPassSource, got {other}"),
    }
}

#[test]
fn static_sampler_is_rejected() {
    let source = r"
input UI

vertAttr UiLayout

VertAttr UiLayout
{
    float4 position : POSITION
}

RootSig
{
    StaticSampler(s0)
}

Shader : Vs
External : UiLayout
<[
float4 main(UiLayout vertex) : SV_POSITION { return vertex.position; }
]>
";
    let fixture = Fixture::new("static-sampler");
    fixture
        .write("ui.pass", source)
        .write("main.framegraph", "ui\n");
    let err = fixture.build().unwrap_err();
    assert!(matches!(err, CinderError::InvalidPassSource { .. }));
}

#[test]
fn shader_error_directive_fails_compilation() {
    let broken = UI_PASS.replace("return float4(1.0, 1.0, 1.0, 1.0);", "#error broken shader");
    let fixture = Fixture::new("shader-error");
    fixture
        .write("ui.pass", &broken)
        .write("main.framegraph", "ui\n");
    let err = fixture.build().unwrap_err();
    match err {
        CinderError::ShaderCompileError { pass, log } => {
            assert_eq!(pass, "ui");
            assert!(log.contains("#error broken shader"));
        }
        other => panic!("expected ShaderCompileError, got {other}"),
    }
}

// ============================================================================
// Idempotence & hot reload
// ============================================================================

#[test]
fn rebuilding_unchanged_sources_is_structurally_equal() {
    let fixture = Fixture::new("idempotent");
    fixture
        .write("ui.pass", UI_PASS)
        .write("opaque.pass", &static_pass(CAM_RESOURCE))
        .write("main.framegraph", "ui\nopaque\n");

    let first = fixture.build().unwrap();
    let second = fixture.build().unwrap();
    assert!(first.structure_eq(&second));
}

struct CountingHost {
    flushes: usize,
}

impl RendererHost for CountingHost {
    fn flush_all_frames(&mut self) {
        self.flushes += 1;
    }

    fn draw_area_size(&self) -> (u32, u32) {
        (800, 600)
    }
}

#[test]
fn hot_reload_drains_frames_and_keeps_previous_graph_on_failure() {
    let fixture = Fixture::new("hot-reload");
    fixture
        .write("ui.pass", UI_PASS)
        .write("main.framegraph", "ui\n");

    let device = NullDevice::new();
    let builder = FrameGraphBuilder::new(fixture.config.clone()).unwrap();
    let mut watcher = FrameGraphWatcher::new(&fixture.dir).unwrap();
    let mut host = CountingHost { flushes: 0 };
    let mut graph = FrameGraph::new();

    // Initial build: the watcher starts dirty.
    assert!(
        builder
            .rebuild_if_dirty(&mut watcher, &device, &mut host, &mut graph)
            .unwrap()
    );
    assert_eq!(host.flushes, 1);
    assert_eq!(graph.pass_count(), 1);

    // Nothing changed: no rebuild, no flush.
    assert!(
        !builder
            .rebuild_if_dirty(&mut watcher, &device, &mut host, &mut graph)
            .unwrap()
    );
    assert_eq!(host.flushes, 1);

    // Break the directory: rebuild fails, previous graph stays live.
    let baseline = fixture.build().unwrap();
    fixture.write("broken.pass", "input UI\nthis is not a pass\n");
    fixture.write("main.framegraph", "ui\nbroken\n");
    let result = builder.rebuild_if_dirty(&mut watcher, &device, &mut host, &mut graph);
    assert!(result.is_err());
    assert_eq!(host.flushes, 2);
    assert!(graph.structure_eq(&baseline));
}

// ============================================================================
// Frame execution
// ============================================================================

const PER_PASS_ARGS_PASS: &str = r"
input Static

vertAttr WorldLayout

VertAttr WorldLayout
{
    float3 position : POSITION
}

Resource <Local, PerPass> ConstBuffer Frame : register(b0)
{
    float4 fog;
}

Resource <Global, PerPass> Texture skyMap : register(t0)
Resource <Global, PerPass> Sampler skySampler : register(s0)
Resource <Local, PerPass> Texture noiseMap : register(t1)
Resource <Local, PerPass> Sampler noiseSampler : register(s1)

RootSig
{
    CBV(b0),
    DescTable(SRV(t0), Sampler(s0)),
    DescTable(SRV(t1), Sampler(s1))
}

Shader : Vs
External : Frame, WorldLayout
<[
float4 main(WorldLayout vertex) : SV_POSITION
{
    return float4(vertex.position, 1.0) + fog;
}
]>
";

#[test]
fn pass_frequency_arguments_bind_at_runtime() {
    let fixture = Fixture::new("pass-frequency");
    fixture
        .write("fog.pass", PER_PASS_ARGS_PASS)
        .write("main.framegraph", "fog\n");
    let mut graph = fixture.build().unwrap();

    // Routing: Frame CBV and the noise table stay pass-local, the sky
    // table is deduplicated into the pass-global pool.
    let params = &graph.passes()[0].core().params;
    assert_eq!(params.pass_local.len(), 2);
    assert_eq!(params.pass_global_indices.len(), 1);
    assert_eq!(graph.passes_global_res.len(), 1);

    let mut registry = cinder::BufferRegistry::new();
    let frame_buffer = registry.create_buffer(16, "Frame");
    assert!(graph.bind_pass_local_cbv(0, name_hash("Frame"), frame_buffer, 0));
    assert!(!graph.bind_pass_local_cbv(0, name_hash("Ghost"), frame_buffer, 0));
    assert!(!graph.bind_pass_local_cbv(9, name_hash("Frame"), frame_buffer, 0));

    let mut descriptors = FxHashMap::default();
    descriptors.insert(name_hash("skyMap"), 5);
    descriptors.insert(name_hash("skySampler"), 6);
    descriptors.insert(name_hash("noiseMap"), 7);
    descriptors.insert(name_hash("noiseSampler"), 8);

    let geometry = registry.create_buffer(3 * 12, "tri");
    let mut draw_lists = FrameDrawLists::default();
    draw_lists.push(
        PassInput::Static,
        DrawObject {
            const_data: FxHashMap::default(),
            vertices: VertexSource::Resident(geometry),
            vertex_count: 3,
        },
    );

    let mut memory = FrameMemory::begin(1);
    let mut cmd = RecordingCommandList::new();
    graph.execute_frame(
        &mut registry,
        &mut memory,
        &draw_lists,
        &descriptors,
        (800, 600),
        &mut cmd,
    );

    // The local CBV, the local table and the global table all bind; the
    // tables carry their first entity's resolved heap index.
    assert!(cmd.commands.contains(&RecordedCommand::SetRootCbv {
        bind_index: 0,
        buffer: frame_buffer,
        offset: 0,
    }));
    assert!(cmd.commands.contains(&RecordedCommand::SetRootTable {
        bind_index: 1,
        first_descriptor: 5,
    }));
    assert!(cmd.commands.contains(&RecordedCommand::SetRootTable {
        bind_index: 2,
        first_descriptor: 7,
    }));
    assert_eq!(
        cmd.commands
            .iter()
            .filter(|command| matches!(command, RecordedCommand::Draw { .. }))
            .count(),
        1
    );
}

#[test]
fn executing_a_frame_records_the_expected_commands() {
    let fixture = Fixture::new("execute");
    fixture
        .write("ui.pass", UI_PASS)
        .write("main.framegraph", "ui\n");
    let mut graph = fixture.build().unwrap();

    let mut registry = cinder::BufferRegistry::new();
    let tint_buffer = registry.create_buffer(16, "Tint");
    assert!(graph.bind_pass_global_cbv(name_hash("Tint"), tint_buffer, 0));

    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct PlacementData {
        pos: [f32; 4],
        scale: [f32; 4],
    }
    let placement = PlacementData {
        pos: [10.0, 20.0, 0.0, 0.0],
        scale: [2.0, 2.0, 1.0, 1.0],
    };

    let mut draw_lists = FrameDrawLists::default();
    let mut const_data = FxHashMap::default();
    const_data.insert(
        name_hash("Placement"),
        bytemuck::bytes_of(&placement).to_vec(),
    );
    draw_lists.push(
        PassInput::Ui,
        DrawObject {
            const_data,
            vertices: VertexSource::Streamed(vec![0u8; 3 * 24]),
            vertex_count: 3,
        },
    );

    let mut memory = FrameMemory::begin(1);
    let mut cmd = RecordingCommandList::new();
    let descriptors = FxHashMap::default();
    graph.execute_frame(
        &mut registry,
        &mut memory,
        &draw_lists,
        &descriptors,
        (800, 600),
        &mut cmd,
    );

    let commands = &cmd.commands;
    assert!(matches!(commands.first(), Some(RecordedCommand::BeginPass { .. })));
    assert!(matches!(commands.last(), Some(RecordedCommand::EndPass)));

    // Pass-global Tint at root index 0, per-object Placement at index 1.
    let cbv_binds: Vec<u32> = commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::SetRootCbv { bind_index, .. } => Some(*bind_index),
            _ => None,
        })
        .collect();
    assert_eq!(cbv_binds, vec![0, 1]);

    let draws = commands
        .iter()
        .filter(|command| matches!(command, RecordedCommand::Draw { .. }))
        .count();
    assert_eq!(draws, 1);

    // UiLayout is float4 + float2, interleaved in slot 0.
    assert!(commands.iter().any(|command| matches!(
        command,
        RecordedCommand::SetVertexBuffer { stride: 24, .. }
    )));

    // Frame retirement releases the leased arenas.
    memory.retire(&mut registry);
    registry.on_fence_completed(1);
    assert!(registry.is_live(tint_buffer));
    assert_eq!(registry.live_count(), 1);
}
