//! The rayon code paths must produce the same output as a sequential walk

#![cfg(feature = "parallel")]

use glam::{Mat4, Quat, Vec3};
use hkx_anim::animation::{BoneBasisTrack, correct_track};
use hkx_anim::{
    AnimationClip, AnimationImporter, ImportOptions, MemoryHost, Skeleton, SkeletonBuilder, Track,
    Transform, correct_continuity, resolve_basis_samples,
};
use pretty_assertions::assert_eq;

const BONES: usize = 48;
const SAMPLES: usize = 24;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Binary tree, so most parents have two animated children
fn tree_skeleton() -> Skeleton {
    let mut builder = SkeletonBuilder::new().root("bone_0", Transform::IDENTITY);
    for i in 1..BONES {
        let rest = Transform::new(
            Vec3::new(0.1 * (i % 3) as f32, 0.25, 0.0),
            Quat::from_rotation_z(0.05 * i as f32),
            Vec3::ONE,
        );
        builder = builder.child_of_index(format!("bone_{i}"), (i - 1) / 2, rest);
    }
    builder.build().unwrap()
}

/// Every bone animated, with the rotation sign flipping on odd samples
fn animated_clip(name: &str, skeleton: &Skeleton, phase: f32) -> AnimationClip {
    // Reverse order so the output has to be sorted back into bone order
    let tracks = skeleton
        .bones()
        .iter()
        .enumerate()
        .rev()
        .map(|(index, bone)| {
            let samples = (0..SAMPLES)
                .map(|frame| {
                    let angle = (frame as f32 * 0.2 + index as f32 + phase).sin();
                    let rotation = Quat::from_rotation_y(angle);
                    Transform::new(
                        Vec3::new(index as f32 * 0.1, frame as f32 * 0.05, 0.0),
                        if frame % 2 == 1 { -rotation } else { rotation },
                        Vec3::ONE,
                    )
                })
                .collect();
            Track::new(bone.name.clone(), samples)
        })
        .collect();
    AnimationClip::new(name, tracks, Some(vec![Vec3::ZERO, Vec3::Z])).unwrap()
}

/// Bone-by-bone, sample-by-sample basis computation
fn sequential_basis(skeleton: &Skeleton, clip: &AnimationClip) -> Vec<BoneBasisTrack> {
    skeleton
        .bones()
        .iter()
        .map(|bone| {
            let track = clip.track(&bone.name).unwrap();
            let parent = bone.parent.map(|p| clip.track(&skeleton.bones()[p].name).unwrap());
            let samples = track
                .samples
                .iter()
                .enumerate()
                .map(|(sample, armature)| {
                    let parent_inv = parent
                        .map_or(Mat4::IDENTITY, |p| p.samples[sample].matrix().inverse());
                    Transform::from_matrix(
                        bone.rest_local.matrix().inverse() * parent_inv * armature.matrix(),
                    )
                })
                .collect();
            BoneBasisTrack {
                bone: bone.name.clone(),
                samples,
            }
        })
        .collect()
}

#[test]
fn test_parallel_basis_matches_sequential() {
    init_logging();
    let skeleton = tree_skeleton();
    let clip = animated_clip("a00_0000", &skeleton, 0.0);

    let parallel = resolve_basis_samples(&skeleton, &clip).unwrap();
    let sequential = sequential_basis(&skeleton, &clip);

    let names: Vec<&str> = parallel.iter().map(|t| t.bone.as_str()).collect();
    let expected: Vec<&str> = sequential.iter().map(|t| t.bone.as_str()).collect();
    assert_eq!(names, expected);
    for (a, b) in parallel.iter().zip(&sequential) {
        assert_eq!(a.samples.len(), b.samples.len());
        for (x, y) in a.samples.iter().zip(&b.samples) {
            assert!(x.approx_eq(y, 1e-4), "{}: {:?} != {:?}", a.bone, x, y);
        }
    }
}

#[test]
fn test_parallel_continuity_matches_sequential() {
    init_logging();
    let skeleton = tree_skeleton();
    let clip = animated_clip("a00_0000", &skeleton, 0.0);
    let mut basis = resolve_basis_samples(&skeleton, &clip).unwrap();
    for track in &mut basis {
        for sample in track.samples.iter_mut().skip(1).step_by(2) {
            sample.rotation = -sample.rotation;
        }
    }

    let mut parallel = basis.clone();
    let flipped = correct_continuity(&mut parallel);

    let mut sequential = basis;
    let expected: usize = sequential
        .iter_mut()
        .map(|track| correct_track(&mut track.samples))
        .sum();

    assert!(flipped > 0);
    assert_eq!(flipped, expected);
    assert_eq!(parallel, sequential);
}

#[test]
fn test_parallel_batch_matches_sequential_imports() {
    init_logging();
    let skeleton = tree_skeleton();
    let clips: Vec<AnimationClip> = (0..6)
        .map(|i| animated_clip(&format!("a00_{i:04}"), &skeleton, i as f32 * 0.3))
        .collect();
    let importer = AnimationImporter::new(ImportOptions::new("c3000"));

    let mut batch_host = MemoryHost::new();
    let report = importer.import_batch(&mut batch_host, &skeleton, clips.clone());

    let mut sequential_host = MemoryHost::new();
    let imported: Vec<_> = clips
        .into_iter()
        .map(|clip| importer.import_clip(&mut sequential_host, &skeleton, clip).unwrap())
        .collect();

    assert!(report.is_success());
    assert_eq!(report.imported, imported);
    assert_eq!(batch_host, sequential_host);
}
