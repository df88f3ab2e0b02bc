//! Resource Model
//!
//! Typed resource declarations as they come out of the pass grammar:
//! const buffers, textures and samplers, each tagged with a *scope*
//! (cross-pass sharing) and a *bind frequency* (update cadence). The two
//! axes are orthogonal; routing of the lowered root arguments depends on
//! both.
//!
//! Validation rules:
//! - within a single pass, resource names are unique;
//! - two Global PerPass resources with equal names must be structurally
//!   equal across the whole program;
//! - Global PerObject resources are checked per input type;
//! - a PerPass name never collides with a PerObject name anywhere.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{CinderError, Result};
use crate::rhi::types::Format;
use crate::utils::hashing::HashedName;

use super::passes::PassInput;

/// Where a resource is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    /// Private to the declaring pass.
    Local,
    /// Shared across passes (deduplicated into central tables).
    Global,
}

/// How often a resource's binding changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindFrequency {
    PerObject,
    PerPass,
}

/// Element type of a const-buffer or vertex-attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Float,
    Float2,
    Float3,
    Float4,
    Float4x4,
    Int,
    Int2,
    Int4,
}

impl FieldType {
    /// Parses the textual form used by the pass grammar.
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "float" => FieldType::Float,
            "float2" => FieldType::Float2,
            "float3" => FieldType::Float3,
            "float4" => FieldType::Float4,
            "float4x4" => FieldType::Float4x4,
            "int" => FieldType::Int,
            "int2" => FieldType::Int2,
            "int4" => FieldType::Int4,
            _ => return None,
        })
    }

    /// HLSL spelling.
    #[must_use]
    pub fn hlsl(self) -> &'static str {
        match self {
            FieldType::Float => "float",
            FieldType::Float2 => "float2",
            FieldType::Float3 => "float3",
            FieldType::Float4 => "float4",
            FieldType::Float4x4 => "float4x4",
            FieldType::Int => "int",
            FieldType::Int2 => "int2",
            FieldType::Int4 => "int4",
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn byte_size(self) -> u32 {
        match self {
            FieldType::Float | FieldType::Int => 4,
            FieldType::Float2 | FieldType::Int2 => 8,
            FieldType::Float3 => 12,
            FieldType::Float4 | FieldType::Int4 => 16,
            FieldType::Float4x4 => 64,
        }
    }

    /// Vertex-element format, for input-layout derivation. `None` for types
    /// that cannot feed the input assembler.
    #[must_use]
    pub fn vertex_format(self) -> Option<Format> {
        Some(match self {
            FieldType::Float => Format::R32Float,
            FieldType::Float2 => Format::Rg32Float,
            FieldType::Float3 => Format::Rgb32Float,
            FieldType::Float4 => Format::Rgba32Float,
            FieldType::Int => Format::R32Sint,
            FieldType::Int2 => Format::Rg32Sint,
            FieldType::Int4 => Format::Rgba32Sint,
            FieldType::Float4x4 => return None,
        })
    }
}

/// One field of a const buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstBufferField {
    pub name: HashedName,
    pub ty: FieldType,
}

/// Const-buffer declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstBufferDecl {
    pub name: HashedName,
    pub register: u32,
    pub fields: Vec<ConstBufferField>,
}

impl ConstBufferDecl {
    /// Byte size of the buffer content (packed, unaligned).
    #[must_use]
    pub fn content_size(&self) -> u32 {
        self.fields.iter().map(|f| f.ty.byte_size()).sum()
    }
}

/// Texture declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDecl {
    pub name: HashedName,
    pub register: u32,
}

/// Sampler declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDecl {
    pub name: HashedName,
    pub register: u32,
}

/// Type-specific content of a resource declaration.
///
/// The set is closed; dispatch is exhaustive matching, never trait objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceContent {
    ConstBuffer(ConstBufferDecl),
    Texture(TextureDecl),
    Sampler(SamplerDecl),
}

/// A declared resource with its scope and bind-frequency tags attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    pub content: ResourceContent,
    pub scope: ResourceScope,
    pub frequency: BindFrequency,
}

impl ResourceDecl {
    #[must_use]
    pub fn name(&self) -> &HashedName {
        match &self.content {
            ResourceContent::ConstBuffer(cb) => &cb.name,
            ResourceContent::Texture(t) => &t.name,
            ResourceContent::Sampler(s) => &s.name,
        }
    }

    #[must_use]
    pub fn register(&self) -> u32 {
        match &self.content {
            ResourceContent::ConstBuffer(cb) => cb.register,
            ResourceContent::Texture(t) => t.register,
            ResourceContent::Sampler(s) => s.register,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match &self.content {
            ResourceContent::ConstBuffer(_) => "ConstBuffer",
            ResourceContent::Texture(_) => "Texture",
            ResourceContent::Sampler(_) => "Sampler",
        }
    }

    /// Scope-invariant identity: kind, name, register and content must all
    /// agree. The scope/frequency tags themselves are not part of identity.
    #[must_use]
    pub fn structurally_equal(&self, other: &ResourceDecl) -> bool {
        self.content == other.content
    }
}

// ============================================================================
// Program-wide validation
// ============================================================================

/// Validates resource declarations across every pass of a frame graph,
/// in pass order. `passes` yields `(pass name, input type, resources)`.
pub fn validate_resources<'a, I>(passes: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, PassInput, &'a [ResourceDecl])>,
{
    // name hash → first-seen declaration
    let mut global_per_pass: FxHashMap<u32, ResourceDecl> = FxHashMap::default();
    let mut global_per_object: FxHashMap<(PassInput, u32), ResourceDecl> = FxHashMap::default();
    let mut per_pass_names: FxHashMap<u32, String> = FxHashMap::default();
    let mut per_object_names: FxHashMap<u32, String> = FxHashMap::default();

    for (pass_name, input, resources) in passes {
        // 1. Names unique within the pass.
        let mut seen = FxHashSet::default();
        for resource in resources {
            if !seen.insert(resource.name().hash()) {
                return Err(CinderError::ResourceNameCollision(format!(
                    "pass '{pass_name}' declares '{}' more than once",
                    resource.name()
                )));
            }
        }

        for resource in resources {
            let hash = resource.name().hash();

            // 4. PerPass and PerObject namespaces are disjoint program-wide.
            let (own_names, other_names) = match resource.frequency {
                BindFrequency::PerPass => (&mut per_pass_names, &per_object_names),
                BindFrequency::PerObject => (&mut per_object_names, &per_pass_names),
            };
            if let Some(offender) = other_names.get(&hash) {
                return Err(CinderError::ResourceNameCollision(format!(
                    "'{}' in pass '{pass_name}' is declared with both bind frequencies \
                     (also used by '{offender}')",
                    resource.name()
                )));
            }
            own_names.entry(hash).or_insert_with(|| pass_name.to_string());

            if resource.scope != ResourceScope::Global {
                continue;
            }

            // 2./3. Global structural equality, PerObject keyed per input type.
            match resource.frequency {
                BindFrequency::PerPass => {
                    if let Some(existing) = global_per_pass.get(&hash) {
                        if !existing.structurally_equal(resource) {
                            return Err(CinderError::ResourceNameCollision(format!(
                                "global per-pass resource '{}' redeclared with different \
                                 structure in pass '{pass_name}'",
                                resource.name()
                            )));
                        }
                    } else {
                        global_per_pass.insert(hash, resource.clone());
                    }
                }
                BindFrequency::PerObject => {
                    let key = (input, hash);
                    if let Some(existing) = global_per_object.get(&key) {
                        if !existing.structurally_equal(resource) {
                            return Err(CinderError::ResourceNameCollision(format!(
                                "global per-object resource '{}' redeclared with different \
                                 structure in pass '{pass_name}' (input {input:?})",
                                resource.name()
                            )));
                        }
                    } else {
                        global_per_object.insert(key, resource.clone());
                    }
                }
            }
        }
    }
    Ok(())
}
