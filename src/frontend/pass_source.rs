//! Pass Source Context
//!
//! [`PassParametersSource`] is the context object the pass grammar's
//! visitation populates: one instance per pass file, holding everything
//! the pipeline compiler needs: the selected input type, render state,
//! vertex-attribute declarations, resources with their scope/frequency
//! tags, the root-signature declaration (typed and textual), shader
//! sources with their external references, and free functions.
//!
//! The instance lives from parse until pipeline compilation completes,
//! then is consumed by move.

use rustc_hash::FxHashMap;

use crate::errors::{CinderError, Result};
use crate::graph::passes::PassInput;
use crate::graph::resources::{
    BindFrequency, ConstBufferDecl, ConstBufferField, FieldType, ResourceContent, ResourceDecl,
    ResourceScope, SamplerDecl, TextureDecl,
};
use crate::graph::rootsig::{DescTableEntityDecl, RootParamDecl};
use crate::rhi::types::{BlendFactor, BlendState, PrimitiveTopology, ShaderStage};
use crate::utils::hashing::{HashedName, name_hash};

use super::grammar::{Grammar, ParseNode};

/// One viewport dimension: literal pixels or a fraction of the draw area,
/// resolved at pipeline-compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportDim {
    Pixels(u32),
    Fraction(f32),
}

impl ViewportDim {
    /// Resolves against the current draw-area extent in pixels.
    #[must_use]
    pub fn resolve(self, draw_extent: u32) -> f32 {
        match self {
            ViewportDim::Pixels(px) => px as f32,
            ViewportDim::Fraction(f) => f * draw_extent as f32,
        }
    }
}

/// One vertex-attribute field: data type, field name, shader semantic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertAttrField {
    pub name: HashedName,
    pub semantic: String,
    pub ty: FieldType,
}

/// A reusable vertex-attribute declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertAttrDecl {
    pub name: String,
    pub fields: Vec<VertAttrField>,
}

/// A free function, injectable into shaders via `External`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub source: String,
}

/// One shader of a pass with its external references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSourceDecl {
    pub stage: ShaderStage,
    pub externals: Vec<String>,
    pub source: String,
}

/// Everything the pass grammar produced for one pass file.
#[derive(Debug, Clone)]
pub struct PassParametersSource {
    pub name: String,
    pub input: PassInput,
    /// Name of the selected `VertAttr` declaration.
    pub vert_attr: String,
    /// Field-name hash → input slot overrides.
    pub vert_attr_slots: FxHashMap<u32, u32>,
    pub color_target: HashedName,
    pub depth_target: HashedName,
    /// x, y, width, height.
    pub viewport: [ViewportDim; 4],
    pub blend: BlendState,
    pub depth_write: bool,
    pub topology: PrimitiveTopology,
    pub shaders: Vec<ShaderSourceDecl>,
    pub root_sig: Vec<RootParamDecl>,
    /// Textual root-signature form, appended to shaders as an attribute.
    pub root_sig_text: String,
    pub resources: Vec<ResourceDecl>,
    pub vert_attr_decls: Vec<VertAttrDecl>,
    pub functions: Vec<FunctionDecl>,
}

impl PassParametersSource {
    /// The selected vertex-attribute declaration.
    pub fn selected_vert_attr(&self) -> Result<&VertAttrDecl> {
        self.vert_attr_decls
            .iter()
            .find(|decl| decl.name == self.vert_attr)
            .ok_or_else(|| CinderError::InvalidPassSource {
                file: self.name.clone(),
                line: 0,
                column: 0,
                message: format!("selected vertAttr '{}' is not declared", self.vert_attr),
            })
    }
}

/// Parses one preprocessed pass source into its context object.
///
/// `name` is the pass name (file stem); it doubles as the error-report
/// file name.
pub fn parse_pass_source(
    grammar: &Grammar,
    name: &str,
    source: &str,
) -> Result<PassParametersSource> {
    let tree = grammar
        .parse(source)
        .map_err(|failure| CinderError::invalid_source(name, source, failure.offset, failure.message))?;

    let mut visitor = PassVisitor {
        grammar,
        name,
        source,
        input: None,
        vert_attr: None,
        vert_attr_slots: FxHashMap::default(),
        color_target: HashedName::new("BACK_BUFFER"),
        depth_target: HashedName::new("BACK_BUFFER_DEPTH"),
        viewport: [
            ViewportDim::Fraction(0.0),
            ViewportDim::Fraction(0.0),
            ViewportDim::Fraction(1.0),
            ViewportDim::Fraction(1.0),
        ],
        blend: BlendState::default(),
        depth_write: true,
        topology: PrimitiveTopology::TriangleList,
        shaders: Vec::new(),
        root_sig: Vec::new(),
        root_sig_text: String::new(),
        resources: Vec::new(),
        vert_attr_decls: Vec::new(),
        functions: Vec::new(),
    };
    visitor.visit_pass(&tree)?;
    visitor.finish()
}

struct PassVisitor<'a> {
    grammar: &'a Grammar,
    name: &'a str,
    source: &'a str,
    input: Option<PassInput>,
    vert_attr: Option<String>,
    vert_attr_slots: FxHashMap<u32, u32>,
    color_target: HashedName,
    depth_target: HashedName,
    viewport: [ViewportDim; 4],
    blend: BlendState,
    depth_write: bool,
    topology: PrimitiveTopology,
    shaders: Vec<ShaderSourceDecl>,
    root_sig: Vec<RootParamDecl>,
    root_sig_text: String,
    resources: Vec<ResourceDecl>,
    vert_attr_decls: Vec<VertAttrDecl>,
    functions: Vec<FunctionDecl>,
}

impl PassVisitor<'_> {
    fn rule(&self, node: &ParseNode) -> &str {
        self.grammar.rule_name(node.rule)
    }

    fn error(&self, node: &ParseNode, message: impl Into<String>) -> CinderError {
        CinderError::invalid_source(self.name, self.source, node.start, message)
    }

    fn text<'n>(&self, node: &'n ParseNode) -> &str {
        node.text(self.source)
    }

    fn visit_pass(&mut self, root: &ParseNode) -> Result<()> {
        for decl in root.children_named(self.grammar, "Decl") {
            for inner in &decl.children {
                match self.rule(inner) {
                    "InputDecl" => self.visit_input(inner)?,
                    "StateDecl" => self.visit_state(inner)?,
                    "VertAttrSlots" => self.visit_vert_attr_slots(inner)?,
                    "VertAttrSelect" => {
                        let ident = self.expect_child(inner, "Ident")?;
                        self.vert_attr = Some(self.text(ident).to_string());
                    }
                    "VertAttrDecl" => self.visit_vert_attr_decl(inner)?,
                    "ResourceDecl" => self.visit_resource(inner)?,
                    "RootSigDecl" => self.visit_root_sig(inner)?,
                    "ShaderDecl" => self.visit_shader(inner)?,
                    "FunctionDecl" => self.visit_function(inner)?,
                    other => {
                        return Err(self.error(inner, format!("unexpected declaration '{other}'")));
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<PassParametersSource> {
        let Some(input) = self.input else {
            return Err(CinderError::InvalidPassSource {
                file: self.name.to_string(),
                line: 1,
                column: 1,
                message: "pass declares no 'input' type".to_string(),
            });
        };
        let Some(vert_attr) = self.vert_attr else {
            return Err(CinderError::InvalidPassSource {
                file: self.name.to_string(),
                line: 1,
                column: 1,
                message: "pass selects no 'vertAttr' input layout".to_string(),
            });
        };
        Ok(PassParametersSource {
            name: self.name.to_string(),
            input,
            vert_attr,
            vert_attr_slots: self.vert_attr_slots,
            color_target: self.color_target,
            depth_target: self.depth_target,
            viewport: self.viewport,
            blend: self.blend,
            depth_write: self.depth_write,
            topology: self.topology,
            shaders: self.shaders,
            root_sig: self.root_sig,
            root_sig_text: self.root_sig_text,
            resources: self.resources,
            vert_attr_decls: self.vert_attr_decls,
            functions: self.functions,
        })
    }

    fn expect_child<'n>(&self, node: &'n ParseNode, rule: &str) -> Result<&'n ParseNode> {
        node.child(self.grammar, rule)
            .ok_or_else(|| self.error(node, format!("missing '{rule}'")))
    }

    fn visit_input(&mut self, node: &ParseNode) -> Result<()> {
        let ty = self.expect_child(node, "InputType")?;
        self.input = Some(match self.text(ty) {
            "UI" => PassInput::Ui,
            "Static" => PassInput::Static,
            "Dynamic" => PassInput::Dynamic,
            "Particles" => PassInput::Particles,
            other => return Err(self.error(ty, format!("unknown input type '{other}'"))),
        });
        Ok(())
    }

    fn visit_state(&mut self, node: &ParseNode) -> Result<()> {
        for entry in node.children_named(self.grammar, "StateEntry") {
            for inner in &entry.children {
                match self.rule(inner) {
                    "ColorTarget" => {
                        let ident = self.expect_child(inner, "Ident")?;
                        self.color_target = HashedName::new(self.text(ident));
                    }
                    "DepthTarget" => {
                        let ident = self.expect_child(inner, "Ident")?;
                        self.depth_target = HashedName::new(self.text(ident));
                    }
                    "ViewportEntry" => {
                        let numbers: Vec<&ParseNode> =
                            inner.children_named(self.grammar, "Number").collect();
                        if numbers.len() != 4 {
                            return Err(self.error(inner, "viewport needs 4 values"));
                        }
                        for (slot, number) in numbers.iter().enumerate() {
                            self.viewport[slot] = self.parse_viewport_dim(number)?;
                        }
                    }
                    "BlendEnabled" => {
                        self.blend.enabled = self.parse_bool(inner)?;
                    }
                    "SrcBlend" => {
                        self.blend.src = self.parse_blend_factor(inner)?;
                    }
                    "DestBlend" => {
                        self.blend.dst = self.parse_blend_factor(inner)?;
                    }
                    "DepthWriteMask" => {
                        self.depth_write = self.parse_bool(inner)?;
                    }
                    "TopologyEntry" => {
                        let topo = self.expect_child(inner, "Topology")?;
                        self.topology = match self.text(topo) {
                            "PointList" => PrimitiveTopology::PointList,
                            "LineList" => PrimitiveTopology::LineList,
                            "TriangleList" => PrimitiveTopology::TriangleList,
                            "TriangleStrip" => PrimitiveTopology::TriangleStrip,
                            other => {
                                return Err(self.error(topo, format!("unknown topology '{other}'")));
                            }
                        };
                    }
                    other => return Err(self.error(inner, format!("unknown state entry '{other}'"))),
                }
            }
        }
        Ok(())
    }

    fn parse_viewport_dim(&self, node: &ParseNode) -> Result<ViewportDim> {
        let text = self.text(node);
        if text.contains('.') {
            let value: f32 = text
                .parse()
                .map_err(|_| self.error(node, format!("bad viewport fraction '{text}'")))?;
            Ok(ViewportDim::Fraction(value))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(node, format!("bad viewport extent '{text}'")))?;
            if value < 0 {
                return Err(self.error(node, "viewport extents cannot be negative"));
            }
            Ok(ViewportDim::Pixels(value as u32))
        }
    }

    fn parse_bool(&self, node: &ParseNode) -> Result<bool> {
        let value = self.expect_child(node, "Bool")?;
        Ok(self.text(value) == "true")
    }

    fn parse_blend_factor(&self, node: &ParseNode) -> Result<BlendFactor> {
        let value = self.expect_child(node, "BlendFactor")?;
        Ok(match self.text(value) {
            "Zero" => BlendFactor::Zero,
            "One" => BlendFactor::One,
            "SrcAlpha" => BlendFactor::SrcAlpha,
            "InvSrcAlpha" => BlendFactor::InvSrcAlpha,
            other => return Err(self.error(value, format!("unknown blend factor '{other}'"))),
        })
    }

    fn visit_vert_attr_slots(&mut self, node: &ParseNode) -> Result<()> {
        for entry in node.children_named(self.grammar, "SlotEntry") {
            let ident = self.expect_child(entry, "Ident")?;
            let slot = self.expect_child(entry, "Int")?;
            let slot: u32 = self
                .text(slot)
                .parse()
                .map_err(|_| self.error(entry, "bad slot index"))?;
            self.vert_attr_slots
                .insert(name_hash(self.text(ident)), slot);
        }
        Ok(())
    }

    fn visit_vert_attr_decl(&mut self, node: &ParseNode) -> Result<()> {
        let name = self.expect_child(node, "Ident")?;
        let mut fields = Vec::new();
        for field in node.children_named(self.grammar, "VertAttrField") {
            let ty = self.parse_data_type(field)?;
            let ident = self.expect_child(field, "Ident")?;
            let semantic = self.expect_child(field, "Semantic")?;
            fields.push(VertAttrField {
                name: HashedName::new(self.text(ident)),
                semantic: self.text(semantic).to_string(),
                ty,
            });
        }
        if fields.is_empty() {
            return Err(self.error(node, "vertex-attribute declaration has no fields"));
        }
        self.vert_attr_decls.push(VertAttrDecl {
            name: self.text(name).to_string(),
            fields,
        });
        Ok(())
    }

    fn parse_data_type(&self, node: &ParseNode) -> Result<FieldType> {
        let ty = self.expect_child(node, "DataType")?;
        FieldType::from_keyword(self.text(ty))
            .ok_or_else(|| self.error(ty, format!("unknown data type '{}'", self.text(ty))))
    }

    fn visit_resource(&mut self, node: &ParseNode) -> Result<()> {
        let scope = match self.text(self.expect_child(node, "Scope")?) {
            "Local" => ResourceScope::Local,
            _ => ResourceScope::Global,
        };
        let frequency = match self.text(self.expect_child(node, "Frequency")?) {
            "PerObject" => BindFrequency::PerObject,
            _ => BindFrequency::PerPass,
        };

        let content = if let Some(cb) = node.child(self.grammar, "ConstBufferRes") {
            let name = self.expect_child(cb, "Ident")?;
            let register = self.parse_register(cb)?;
            let mut fields = Vec::new();
            for field in cb.children_named(self.grammar, "CbField") {
                let ty = self.parse_data_type(field)?;
                let ident = self.expect_child(field, "Ident")?;
                fields.push(ConstBufferField {
                    name: HashedName::new(self.text(ident)),
                    ty,
                });
            }
            ResourceContent::ConstBuffer(ConstBufferDecl {
                name: HashedName::new(self.text(name)),
                register,
                fields,
            })
        } else if let Some(tex) = node.child(self.grammar, "TextureRes") {
            let name = self.expect_child(tex, "Ident")?;
            ResourceContent::Texture(TextureDecl {
                name: HashedName::new(self.text(name)),
                register: self.parse_register(tex)?,
            })
        } else if let Some(samp) = node.child(self.grammar, "SamplerRes") {
            let name = self.expect_child(samp, "Ident")?;
            ResourceContent::Sampler(SamplerDecl {
                name: HashedName::new(self.text(name)),
                register: self.parse_register(samp)?,
            })
        } else {
            return Err(self.error(node, "unknown resource kind"));
        };

        self.resources.push(ResourceDecl {
            content,
            scope,
            frequency,
        });
        Ok(())
    }

    fn parse_register(&self, node: &ParseNode) -> Result<u32> {
        let register = self.expect_child(node, "Int")?;
        self.text(register)
            .parse()
            .map_err(|_| self.error(register, "bad register index"))
    }

    fn visit_root_sig(&mut self, node: &ParseNode) -> Result<()> {
        // Textual form for the shader [RootSignature("...")] attribute:
        // the block's inner text, whitespace-collapsed to a single line.
        let text = self.text(node);
        let inner = text
            .find('{')
            .and_then(|open| text.rfind('}').map(|close| &text[open + 1..close]))
            .unwrap_or("");
        self.root_sig_text = inner.split_whitespace().collect::<Vec<_>>().join(" ");

        for param in node.children_named(self.grammar, "RootParam") {
            for inner in &param.children {
                match self.rule(inner) {
                    "RootCbv" => {
                        let ints: Vec<&ParseNode> =
                            inner.children_named(self.grammar, "Int").collect();
                        let register = match ints.first() {
                            Some(node) => self.parse_int(node)?,
                            None => return Err(self.error(inner, "CBV without a register")),
                        };
                        let num = match ints.get(1) {
                            Some(node) => self.parse_int(node)?,
                            None => 1,
                        };
                        self.root_sig.push(RootParamDecl::InlineCbv { register, num });
                    }
                    "DescTable" => {
                        let mut entities = Vec::new();
                        for entity in inner.children_named(self.grammar, "TableEntity") {
                            for kind in &entity.children {
                                let register =
                                    self.parse_int(self.expect_child(kind, "Int")?)?;
                                entities.push(match self.rule(kind) {
                                    "TableCbv" => DescTableEntityDecl::Cbv { register },
                                    "TableSrv" => DescTableEntityDecl::Srv { register },
                                    "TableSampler" => DescTableEntityDecl::Sampler { register },
                                    "TableUav" => {
                                        return Err(self.error(
                                            kind,
                                            "UAV descriptor-table entries are not supported",
                                        ));
                                    }
                                    other => {
                                        return Err(self
                                            .error(kind, format!("unknown table entity '{other}'")));
                                    }
                                });
                            }
                        }
                        self.root_sig.push(RootParamDecl::DescTable { entities });
                    }
                    "RootUav" => {
                        return Err(self.error(inner, "UAV root parameters are not supported"));
                    }
                    "StaticSampler" => {
                        return Err(self.error(inner, "static samplers are not supported"));
                    }
                    "RootConstants" => {
                        return Err(self.error(inner, "root constants are not supported"));
                    }
                    other => {
                        return Err(self.error(inner, format!("unknown root parameter '{other}'")));
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_int(&self, node: &ParseNode) -> Result<u32> {
        self.text(node)
            .parse()
            .map_err(|_| self.error(node, "bad integer"))
    }

    fn visit_shader(&mut self, node: &ParseNode) -> Result<()> {
        let stage = match self.text(self.expect_child(node, "ShaderType")?) {
            "Vs" => ShaderStage::Vs,
            "Gs" => ShaderStage::Gs,
            _ => ShaderStage::Ps,
        };
        let externals = match node.child(self.grammar, "Externals") {
            Some(ext) => ext
                .children_named(self.grammar, "Ident")
                .map(|ident| self.text(ident).to_string())
                .collect(),
            None => Vec::new(),
        };
        let source = self.code_block_text(node)?;
        self.shaders.push(ShaderSourceDecl {
            stage,
            externals,
            source,
        });
        Ok(())
    }

    fn visit_function(&mut self, node: &ParseNode) -> Result<()> {
        let name = self.expect_child(node, "Ident")?;
        let source = self.code_block_text(node)?;
        self.functions.push(FunctionDecl {
            name: self.text(name).to_string(),
            source,
        });
        Ok(())
    }

    fn code_block_text(&self, node: &ParseNode) -> Result<String> {
        let block = self.expect_child(node, "CodeBlock")?;
        let code = self.expect_child(block, "CodeText")?;
        Ok(self.text(code).trim().to_string())
    }
}
