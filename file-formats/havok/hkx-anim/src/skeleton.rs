//! Skeleton hierarchy with validated parent links and rest pose
//!
//! Bones are stored in the order they were declared. Parent links are
//! resolved to indices at build time, and the builder rejects duplicate
//! names, dangling parents and cycles so that every parent chain ends at a
//! root.

use crate::coordinate::CoordinateTransformer;
use crate::error::{AnimError, Result};
use crate::transform::Transform;
use glam::Mat4;
use std::collections::HashMap;

/// A single bone with its rest (bind) pose relative to its parent
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bone {
    /// Unique bone name
    pub name: String,
    /// Parent bone index (None for roots)
    pub parent: Option<usize>,
    /// Rest transform relative to the parent's rest transform
    pub rest_local: Transform,
}

/// Parent reference accepted by [`SkeletonBuilder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// Root bone
    None,
    /// Parent by declaration index
    Index(usize),
    /// Parent by bone name
    Name(String),
}

/// Incremental skeleton construction with validation on [`build`](Self::build)
#[derive(Debug, Clone, Default)]
pub struct SkeletonBuilder {
    bones: Vec<(String, ParentRef, Transform)>,
}

impl SkeletonBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bone with an explicit parent reference
    pub fn add_bone(&mut self, name: impl Into<String>, parent: ParentRef, rest_local: Transform) {
        self.bones.push((name.into(), parent, rest_local));
    }

    /// Add a root bone
    pub fn root(mut self, name: impl Into<String>, rest_local: Transform) -> Self {
        self.add_bone(name, ParentRef::None, rest_local);
        self
    }

    /// Add a bone parented to a bone of the given name
    pub fn child_of(
        mut self,
        name: impl Into<String>,
        parent: impl Into<String>,
        rest_local: Transform,
    ) -> Self {
        self.add_bone(name, ParentRef::Name(parent.into()), rest_local);
        self
    }

    /// Add a bone parented to the bone at the given declaration index
    pub fn child_of_index(
        mut self,
        name: impl Into<String>,
        parent: usize,
        rest_local: Transform,
    ) -> Self {
        self.add_bone(name, ParentRef::Index(parent), rest_local);
        self
    }

    /// Validate the hierarchy and produce a skeleton
    pub fn build(self) -> Result<Skeleton> {
        let count = self.bones.len();
        let mut name_to_index = HashMap::with_capacity(count);

        for (index, (name, _, _)) in self.bones.iter().enumerate() {
            if name_to_index.insert(name.clone(), index).is_some() {
                return Err(AnimError::InvalidSkeleton(format!(
                    "duplicate bone name '{name}'"
                )));
            }
        }

        let mut bones = Vec::with_capacity(count);
        for (index, (name, parent, rest_local)) in self.bones.into_iter().enumerate() {
            let parent = match parent {
                ParentRef::None => None,
                ParentRef::Index(parent_index) => {
                    if parent_index >= count {
                        return Err(AnimError::InvalidSkeleton(format!(
                            "bone '{name}' has parent index {parent_index}, only {count} bones"
                        )));
                    }
                    Some(parent_index)
                }
                ParentRef::Name(parent_name) => match name_to_index.get(&parent_name) {
                    Some(&parent_index) => Some(parent_index),
                    None => {
                        return Err(AnimError::InvalidSkeleton(format!(
                            "bone '{name}' has parent '{parent_name}' which is not in the skeleton"
                        )));
                    }
                },
            };

            if parent == Some(index) {
                return Err(AnimError::InvalidSkeleton(format!(
                    "bone '{name}' is its own parent"
                )));
            }

            bones.push(Bone {
                name,
                parent,
                rest_local,
            });
        }

        let order = topological_order(&bones)?;

        Ok(Skeleton {
            bones,
            name_to_index,
            order,
        })
    }
}

/// Validated bone forest
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    /// Bone indices with every parent before its children
    order: Vec<usize>,
}

impl Skeleton {
    /// Build a skeleton from parallel arrays, using negative parent indices for roots
    ///
    /// This is the layout decoded skeleton resources use (`parentIndices` with -1).
    pub fn from_parent_indices(
        names: &[String],
        parents: &[i16],
        rest_locals: &[Transform],
    ) -> Result<Self> {
        if names.len() != parents.len() || names.len() != rest_locals.len() {
            return Err(AnimError::InvalidSkeleton(format!(
                "mismatched array lengths: {} names, {} parents, {} transforms",
                names.len(),
                parents.len(),
                rest_locals.len()
            )));
        }

        let mut builder = SkeletonBuilder::new();
        for ((name, &parent), rest_local) in names.iter().zip(parents).zip(rest_locals) {
            let parent = if parent < 0 {
                ParentRef::None
            } else {
                ParentRef::Index(parent as usize)
            };
            builder.add_bone(name.clone(), parent, *rest_local);
        }
        builder.build()
    }

    /// Get number of bones
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Check if the skeleton has no bones
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// All bones in declaration order
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Bone at the given index
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Index of the bone with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Bone with the given name
    pub fn bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.index_of(name).map(|i| &self.bones[i])
    }

    /// Check if a bone of the given name exists
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Bone indices ordered so that parents precede their children
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Iterate over the ancestors of a bone, nearest first
    pub fn ancestors(&self, index: usize) -> Ancestors<'_> {
        Ancestors {
            skeleton: self,
            next: self.bones.get(index).and_then(|b| b.parent),
        }
    }

    /// Rest transform of a bone in armature space
    ///
    /// This is the composition of the bone's rest local transform with those of
    /// all of its ancestors.
    pub fn rest_armature(&self, index: usize) -> Transform {
        Transform::from_matrix(self.rest_armature_matrix(index))
    }

    /// Rest armature-space matrix of a bone
    pub fn rest_armature_matrix(&self, index: usize) -> Mat4 {
        let Some(bone) = self.bones.get(index) else {
            return Mat4::IDENTITY;
        };
        let mut matrix = bone.rest_local.matrix();
        for ancestor in self.ancestors(index) {
            matrix = self.bones[ancestor].rest_local.matrix() * matrix;
        }
        matrix
    }

    /// Rest armature-space transforms of every bone, in declaration order
    pub fn rest_armature_all(&self) -> Vec<Transform> {
        let mut matrices = vec![Mat4::IDENTITY; self.bones.len()];
        for &index in &self.order {
            let bone = &self.bones[index];
            let local = bone.rest_local.matrix();
            matrices[index] = match bone.parent {
                Some(parent) => matrices[parent] * local,
                None => local,
            };
        }
        matrices.into_iter().map(Transform::from_matrix).collect()
    }

    /// Cached rest matrices for one resolution pass
    pub fn bind_pose_cache(&self) -> BindPoseCache<'_> {
        BindPoseCache::new(self)
    }

    /// Re-express every rest transform in another coordinate system
    pub fn converted(&self, transformer: &CoordinateTransformer) -> Self {
        if transformer.is_identity() {
            return self.clone();
        }
        let bones = self
            .bones
            .iter()
            .map(|bone| Bone {
                name: bone.name.clone(),
                parent: bone.parent,
                rest_local: transformer.transform_trs(&bone.rest_local),
            })
            .collect();
        Self {
            bones,
            name_to_index: self.name_to_index.clone(),
            order: self.order.clone(),
        }
    }
}

/// Iterator over a bone's ancestors, see [`Skeleton::ancestors`]
pub struct Ancestors<'a> {
    skeleton: &'a Skeleton,
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.skeleton.bones.get(current).and_then(|b| b.parent);
        Some(current)
    }
}

/// Rest matrices and their inverses, indexed by bone
///
/// Computed once per resolution pass and dropped with it.
#[derive(Debug)]
pub struct BindPoseCache<'a> {
    skeleton: &'a Skeleton,
    rest_local: Vec<Mat4>,
    rest_local_inv: Vec<Mat4>,
    rest_armature: Vec<Mat4>,
}

impl<'a> BindPoseCache<'a> {
    fn new(skeleton: &'a Skeleton) -> Self {
        let count = skeleton.len();
        let rest_local: Vec<Mat4> = skeleton.bones.iter().map(|b| b.rest_local.matrix()).collect();
        let rest_local_inv = rest_local.iter().map(Mat4::inverse).collect();

        let mut rest_armature = vec![Mat4::IDENTITY; count];
        for &index in &skeleton.order {
            rest_armature[index] = match skeleton.bones[index].parent {
                Some(parent) => rest_armature[parent] * rest_local[index],
                None => rest_local[index],
            };
        }

        Self {
            skeleton,
            rest_local,
            rest_local_inv,
            rest_armature,
        }
    }

    /// Skeleton this cache was built from
    pub fn skeleton(&self) -> &'a Skeleton {
        self.skeleton
    }

    /// Rest matrix of a bone relative to its parent
    pub fn rest_local(&self, index: usize) -> Mat4 {
        self.rest_local[index]
    }

    /// Inverse of [`rest_local`](Self::rest_local)
    pub fn rest_local_inv(&self, index: usize) -> Mat4 {
        self.rest_local_inv[index]
    }

    /// Rest matrix of a bone in armature space
    pub fn rest_armature(&self, index: usize) -> Mat4 {
        self.rest_armature[index]
    }
}

fn topological_order(bones: &[Bone]) -> Result<Vec<usize>> {
    const UNVISITED: u8 = 0;
    const VISITING: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNVISITED; bones.len()];
    let mut order = Vec::with_capacity(bones.len());

    for start in 0..bones.len() {
        if state[start] == DONE {
            continue;
        }

        // Walk up to the first finished ancestor, then emit the chain top-down
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            match state[index] {
                DONE => break,
                VISITING => {
                    return Err(AnimError::InvalidSkeleton(format!(
                        "parent cycle through bone '{}'",
                        bones[index].name
                    )));
                }
                _ => {
                    state[index] = VISITING;
                    chain.push(index);
                    current = bones[index].parent;
                }
            }
        }

        for &index in chain.iter().rev() {
            state[index] = DONE;
            order.push(index);
        }
    }

    Ok(order)
}
