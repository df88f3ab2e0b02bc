//! Root Signature Model & Lowering
//!
//! A *root parameter* is the logical slot declared in a pass's `RootSig`
//! block: an inline CBV or a descriptor table of CBV/SRV/sampler entries.
//! Lowering resolves each parameter against the pass's resource
//! declarations and produces a *root argument*: the runtime binding the
//! pass runtime fills in and binds each frame.
//!
//! Routing is decided by the resolved resources' (scope, bind frequency)
//! pair. Local arguments stay on the pass; Global ones are deduplicated
//! into the frame graph's central tables and the pass keeps only indices.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{CinderError, Result};
use crate::rhi::registry::BufferKey;
use crate::utils::hashing::HashedName;

use super::resources::{
    BindFrequency, ConstBufferField, ResourceContent, ResourceDecl, ResourceScope,
};

// ============================================================================
// Declarations (grammar output)
// ============================================================================

/// Entity inside a descriptor-table declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescTableEntityDecl {
    Cbv { register: u32 },
    Srv { register: u32 },
    Sampler { register: u32 },
}

/// One root parameter as declared in a pass source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootParamDecl {
    /// Inline CBV; `num` is the descriptor count and must be 1.
    InlineCbv { register: u32, num: u32 },
    DescTable { entities: Vec<DescTableEntityDecl> },
}

// ============================================================================
// Runtime arguments
// ============================================================================

/// Inline-CBV root argument: buffer lease plus the const-buffer schema the
/// runtime streams values through.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstBufferViewArg {
    /// Root-parameter index this argument binds to.
    pub bind_index: u32,
    pub name: HashedName,
    pub fields: Vec<ConstBufferField>,
    /// Content size in bytes (derived from `fields`).
    pub size: u32,
    /// Weak reference into the buffer registry; `None` until bound.
    pub buffer: Option<BufferKey>,
    pub buffer_offset: u64,
}

/// Kind of one bound descriptor-table entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescTableEntityKind {
    Cbv,
    Srv,
    Sampler,
}

/// One entity of a descriptor-table argument.
#[derive(Debug, Clone, PartialEq)]
pub struct DescTableEntityArg {
    pub kind: DescTableEntityKind,
    pub name: HashedName,
    pub register: u32,
    /// Resolved descriptor-heap index; `None` until bound.
    pub descriptor_index: Option<u32>,
}

/// Descriptor-table root argument.
#[derive(Debug, Clone, PartialEq)]
pub struct DescTableArg {
    pub bind_index: u32,
    pub entities: Vec<DescTableEntityArg>,
}

/// A runtime root-argument binding. Closed set; exhaustive dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum RootArg {
    ConstBufferView(ConstBufferViewArg),
    DescTable(DescTableArg),
}

impl RootArg {
    #[must_use]
    pub fn bind_index(&self) -> u32 {
        match self {
            RootArg::ConstBufferView(cbv) => cbv.bind_index,
            RootArg::DescTable(table) => table.bind_index,
        }
    }

    /// Whether the argument holds valid GPU references.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        match self {
            RootArg::ConstBufferView(cbv) => cbv.buffer.is_some(),
            RootArg::DescTable(table) => {
                table.entities.iter().all(|e| e.descriptor_index.is_some())
            }
        }
    }

    /// Resolves descriptor-table entities against the central lookup
    /// (resource name hash → heap index). Entities whose resource is not
    /// in the lookup become unbound. Const-buffer views are unaffected.
    pub fn resolve_descriptors(&mut self, descriptors: &FxHashMap<u32, u32>) {
        if let RootArg::DescTable(table) = self {
            for entity in &mut table.entities {
                entity.descriptor_index = descriptors.get(&entity.name.hash()).copied();
            }
        }
    }

    /// Scope-invariant identity used for global deduplication: name(s),
    /// register(s) and content, never the buffer/descriptor state.
    #[must_use]
    pub fn same_identity(&self, other: &RootArg) -> bool {
        match (self, other) {
            (RootArg::ConstBufferView(a), RootArg::ConstBufferView(b)) => {
                a.name == b.name && a.fields == b.fields
            }
            (RootArg::DescTable(a), RootArg::DescTable(b)) => {
                a.entities.len() == b.entities.len()
                    && a.entities.iter().zip(&b.entities).all(|(x, y)| {
                        x.kind == y.kind && x.name == y.name && x.register == y.register
                    })
            }
            _ => false,
        }
    }
}

/// Root arguments of one compiled pass, routed by (scope, frequency).
#[derive(Debug, Default)]
pub struct RoutedArgs {
    /// Local + PerPass: bound once per pass.
    pub pass_local: Vec<RootArg>,
    /// Local + PerObject: cloned per draw object.
    pub per_object_local_template: Vec<RootArg>,
    /// Global + PerPass: indices into `FrameGraph::passes_global_res`.
    pub pass_global_indices: SmallVec<[usize; 8]>,
    /// Global + PerObject: indices into the input type's template table.
    pub per_object_global_indices_template: SmallVec<[usize; 8]>,
}

// ============================================================================
// Lowering
// ============================================================================

/// Lowers the root parameters of one pass into routed root arguments.
///
/// `passes_global_res` and `obj_global_res_template` are the frame graph's
/// central tables; global arguments are deduplicated into them and the
/// pass stores only indices.
pub fn lower_root_params(
    pass_name: &str,
    params: &[RootParamDecl],
    resources: &[ResourceDecl],
    passes_global_res: &mut Vec<RootArg>,
    obj_global_res_template: &mut Vec<RootArg>,
) -> Result<RoutedArgs> {
    let mut routed = RoutedArgs::default();

    for (bind_index, param) in params.iter().enumerate() {
        let bind_index = bind_index as u32;
        match param {
            RootParamDecl::InlineCbv { register, num } => {
                if *num != 1 {
                    return Err(CinderError::InvalidPassSource {
                        file: pass_name.to_string(),
                        line: 0,
                        column: 0,
                        message: format!(
                            "inline CBV at register b{register} declares {num} descriptors; \
                             exactly 1 is required"
                        ),
                    });
                }
                let resource = find_const_buffer(pass_name, resources, *register)?;
                let ResourceContent::ConstBuffer(cb) = &resource.content else {
                    unreachable!()
                };
                let arg = RootArg::ConstBufferView(ConstBufferViewArg {
                    bind_index,
                    name: cb.name.clone(),
                    fields: cb.fields.clone(),
                    size: cb.content_size(),
                    buffer: None,
                    buffer_offset: 0,
                });
                route(
                    &mut routed,
                    arg,
                    resource.scope,
                    resource.frequency,
                    passes_global_res,
                    obj_global_res_template,
                );
            }
            RootParamDecl::DescTable { entities } => {
                let mut shared: Option<(ResourceScope, BindFrequency)> = None;
                let mut args = Vec::with_capacity(entities.len());
                for entity in entities {
                    let (resource, kind) = match entity {
                        DescTableEntityDecl::Cbv { register } => (
                            find_const_buffer(pass_name, resources, *register)?,
                            DescTableEntityKind::Cbv,
                        ),
                        DescTableEntityDecl::Srv { register } => (
                            find_texture(pass_name, resources, *register)?,
                            DescTableEntityKind::Srv,
                        ),
                        DescTableEntityDecl::Sampler { register } => (
                            find_sampler(pass_name, resources, *register)?,
                            DescTableEntityKind::Sampler,
                        ),
                    };
                    let tags = (resource.scope, resource.frequency);
                    match shared {
                        None => shared = Some(tags),
                        Some(existing) if existing == tags => {}
                        Some(existing) => {
                            return Err(CinderError::DescTableMixedFrequency(format!(
                                "pass '{pass_name}': descriptor table entry '{}' is \
                                 {tags:?} but the table started as {existing:?}",
                                resource.name()
                            )));
                        }
                    }
                    args.push(DescTableEntityArg {
                        kind,
                        name: resource.name().clone(),
                        register: resource.register(),
                        descriptor_index: None,
                    });
                }
                let Some((scope, frequency)) = shared else {
                    return Err(CinderError::InvalidPassSource {
                        file: pass_name.to_string(),
                        line: 0,
                        column: 0,
                        message: "empty descriptor table".to_string(),
                    });
                };
                let arg = RootArg::DescTable(DescTableArg {
                    bind_index,
                    entities: args,
                });
                route(
                    &mut routed,
                    arg,
                    scope,
                    frequency,
                    passes_global_res,
                    obj_global_res_template,
                );
            }
        }
    }

    Ok(routed)
}

fn route(
    routed: &mut RoutedArgs,
    arg: RootArg,
    scope: ResourceScope,
    frequency: BindFrequency,
    passes_global_res: &mut Vec<RootArg>,
    obj_global_res_template: &mut Vec<RootArg>,
) {
    match (scope, frequency) {
        (ResourceScope::Local, BindFrequency::PerPass) => routed.pass_local.push(arg),
        (ResourceScope::Local, BindFrequency::PerObject) => {
            routed.per_object_local_template.push(arg);
        }
        (ResourceScope::Global, BindFrequency::PerPass) => {
            let index = dedup_push(passes_global_res, arg);
            routed.pass_global_indices.push(index);
        }
        (ResourceScope::Global, BindFrequency::PerObject) => {
            let index = dedup_push(obj_global_res_template, arg);
            routed.per_object_global_indices_template.push(index);
        }
    }
}

/// Pushes `arg` unless an argument with the same identity already exists;
/// returns the index either way. Deterministic for a fixed pass order.
fn dedup_push(pool: &mut Vec<RootArg>, arg: RootArg) -> usize {
    if let Some(index) = pool.iter().position(|existing| existing.same_identity(&arg)) {
        index
    } else {
        pool.push(arg);
        pool.len() - 1
    }
}

fn find_const_buffer<'a>(
    pass_name: &str,
    resources: &'a [ResourceDecl],
    register: u32,
) -> Result<&'a ResourceDecl> {
    resources
        .iter()
        .find(|r| matches!(r.content, ResourceContent::ConstBuffer(_)) && r.register() == register)
        .ok_or_else(|| missing(pass_name, "ConstBuffer", 'b', register))
}

fn find_texture<'a>(
    pass_name: &str,
    resources: &'a [ResourceDecl],
    register: u32,
) -> Result<&'a ResourceDecl> {
    resources
        .iter()
        .find(|r| matches!(r.content, ResourceContent::Texture(_)) && r.register() == register)
        .ok_or_else(|| missing(pass_name, "Texture", 't', register))
}

fn find_sampler<'a>(
    pass_name: &str,
    resources: &'a [ResourceDecl],
    register: u32,
) -> Result<&'a ResourceDecl> {
    resources
        .iter()
        .find(|r| matches!(r.content, ResourceContent::Sampler(_)) && r.register() == register)
        .ok_or_else(|| missing(pass_name, "Sampler", 's', register))
}

fn missing(pass_name: &str, kind: &str, prefix: char, register: u32) -> CinderError {
    CinderError::InvalidPassSource {
        file: pass_name.to_string(),
        line: 0,
        column: 0,
        message: format!(
            "root parameter references {kind} at register {prefix}{register}, \
             but no such resource is declared"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resources::{ConstBufferDecl, SamplerDecl, TextureDecl};

    fn cb(name: &str, register: u32, scope: ResourceScope, freq: BindFrequency) -> ResourceDecl {
        ResourceDecl {
            content: ResourceContent::ConstBuffer(ConstBufferDecl {
                name: HashedName::new(name),
                register,
                fields: vec![ConstBufferField {
                    name: HashedName::new("value"),
                    ty: crate::graph::resources::FieldType::Float4,
                }],
            }),
            scope,
            frequency: freq,
        }
    }

    fn tex(name: &str, register: u32, scope: ResourceScope, freq: BindFrequency) -> ResourceDecl {
        ResourceDecl {
            content: ResourceContent::Texture(TextureDecl {
                name: HashedName::new(name),
                register,
            }),
            scope,
            frequency: freq,
        }
    }

    fn samp(name: &str, register: u32, scope: ResourceScope, freq: BindFrequency) -> ResourceDecl {
        ResourceDecl {
            content: ResourceContent::Sampler(SamplerDecl {
                name: HashedName::new(name),
                register,
            }),
            scope,
            frequency: freq,
        }
    }

    #[test]
    fn inline_cbv_routes_by_scope_and_frequency() {
        let resources = vec![
            cb("PassLocal", 0, ResourceScope::Local, BindFrequency::PerPass),
            cb("ObjLocal", 1, ResourceScope::Local, BindFrequency::PerObject),
            cb("PassGlobal", 2, ResourceScope::Global, BindFrequency::PerPass),
        ];
        let params = vec![
            RootParamDecl::InlineCbv { register: 0, num: 1 },
            RootParamDecl::InlineCbv { register: 1, num: 1 },
            RootParamDecl::InlineCbv { register: 2, num: 1 },
        ];
        let mut global = Vec::new();
        let mut obj_global = Vec::new();
        let routed =
            lower_root_params("p", &params, &resources, &mut global, &mut obj_global).unwrap();
        assert_eq!(routed.pass_local.len(), 1);
        assert_eq!(routed.per_object_local_template.len(), 1);
        assert_eq!(routed.pass_global_indices.as_slice(), &[0]);
        assert_eq!(global.len(), 1);
        assert!(obj_global.is_empty());
    }

    #[test]
    fn global_dedup_returns_same_index() {
        let resources = vec![cb("Cam", 0, ResourceScope::Global, BindFrequency::PerPass)];
        let params = vec![RootParamDecl::InlineCbv { register: 0, num: 1 }];
        let mut global = Vec::new();
        let mut obj_global = Vec::new();

        let a = lower_root_params("a", &params, &resources, &mut global, &mut obj_global).unwrap();
        let b = lower_root_params("b", &params, &resources, &mut global, &mut obj_global).unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(a.pass_global_indices, b.pass_global_indices);
    }

    #[test]
    fn inline_cbv_rejects_num_above_one() {
        let resources = vec![cb("Cam", 0, ResourceScope::Global, BindFrequency::PerPass)];
        let params = vec![RootParamDecl::InlineCbv { register: 0, num: 2 }];
        let err = lower_root_params("p", &params, &resources, &mut Vec::new(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CinderError::InvalidPassSource { .. }));
    }

    #[test]
    fn desc_table_requires_uniform_tags() {
        let resources = vec![
            tex("sceneTex", 0, ResourceScope::Local, BindFrequency::PerObject),
            samp("linear", 0, ResourceScope::Local, BindFrequency::PerObject),
        ];
        let params = vec![RootParamDecl::DescTable {
            entities: vec![
                DescTableEntityDecl::Srv { register: 0 },
                DescTableEntityDecl::Sampler { register: 0 },
            ],
        }];
        let routed = lower_root_params("p", &params, &resources, &mut Vec::new(), &mut Vec::new())
            .unwrap();
        assert_eq!(routed.per_object_local_template.len(), 1);

        // Flip the sampler to PerPass: the table must be rejected.
        let mixed = vec![
            tex("sceneTex", 0, ResourceScope::Local, BindFrequency::PerObject),
            samp("linear", 0, ResourceScope::Local, BindFrequency::PerPass),
        ];
        let err = lower_root_params("p", &params, &mixed, &mut Vec::new(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CinderError::DescTableMixedFrequency(_)));
    }

    #[test]
    fn every_bind_index_appears_exactly_once() {
        let resources = vec![
            cb("A", 0, ResourceScope::Local, BindFrequency::PerPass),
            tex("T", 0, ResourceScope::Local, BindFrequency::PerPass),
            samp("S", 0, ResourceScope::Local, BindFrequency::PerPass),
        ];
        let params = vec![
            RootParamDecl::InlineCbv { register: 0, num: 1 },
            RootParamDecl::DescTable {
                entities: vec![
                    DescTableEntityDecl::Srv { register: 0 },
                    DescTableEntityDecl::Sampler { register: 0 },
                ],
            },
        ];
        let routed = lower_root_params("p", &params, &resources, &mut Vec::new(), &mut Vec::new())
            .unwrap();
        let mut bind_indices: Vec<u32> =
            routed.pass_local.iter().map(RootArg::bind_index).collect();
        bind_indices.sort_unstable();
        assert_eq!(bind_indices, vec![0, 1]);
    }
}
