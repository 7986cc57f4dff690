//! Property tests for continuity correction and hierarchy round trips

use glam::{Quat, Vec3};
use hkx_anim::animation::{BoneBasisTrack, correct_track, is_continuous, reconstruct_armature};
use hkx_anim::{AnimationClip, Skeleton, SkeletonBuilder, Track, Transform, resolve_basis_samples};
use proptest::prelude::*;

fn rotation() -> impl Strategy<Value = Quat> {
    (
        -1.0f32..1.0,
        -1.0f32..1.0,
        -1.0f32..1.0,
        -3.0f32..3.0,
        any::<bool>(),
    )
        .prop_map(|(x, y, z, angle, negate)| {
            let axis = Vec3::new(x, y, z).try_normalize().unwrap_or(Vec3::Y);
            let q = Quat::from_axis_angle(axis, angle);
            if negate { -q } else { q }
        })
}

fn rigid_transform() -> impl Strategy<Value = Transform> {
    (
        (-2.0f32..2.0, -2.0f32..2.0, -2.0f32..2.0),
        rotation(),
        0.8f32..1.25,
    )
        .prop_map(|((x, y, z), rotation, scale)| {
            Transform::new(Vec3::new(x, y, z), rotation, Vec3::splat(scale))
        })
}

/// root -> spine -> neck, plus an unanimated arm under spine and a hand under it
fn skeleton(rest: &[Transform]) -> Skeleton {
    SkeletonBuilder::new()
        .root("root", rest[0])
        .child_of("spine", "root", rest[1])
        .child_of("neck", "spine", rest[2])
        .child_of("arm", "spine", rest[3])
        .child_of("hand", "arm", rest[4])
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn continuity_holds_and_is_idempotent(rotations in prop::collection::vec(rotation(), 0..32)) {
        let mut samples: Vec<Transform> =
            rotations.iter().map(|&r| Transform::from_rotation(r)).collect();

        correct_track(&mut samples);
        prop_assert!(is_continuous(&samples));

        for (sample, original) in samples.iter().zip(&rotations) {
            let same = sample.rotation.abs_diff_eq(original.normalize(), 1e-5);
            let negated = sample.rotation.abs_diff_eq(-original.normalize(), 1e-5);
            prop_assert!(same || negated);
        }

        let once = samples.clone();
        prop_assert_eq!(correct_track(&mut samples), 0);
        prop_assert_eq!(once, samples);
    }

    #[test]
    fn basis_round_trip_reproduces_armature(
        rest in prop::collection::vec(rigid_transform(), 5),
        frames in prop::collection::vec(prop::collection::vec(rigid_transform(), 3), 1..6),
    ) {
        let skeleton = skeleton(&rest);
        let bones = ["root", "neck", "hand"];
        let tracks: Vec<Track> = bones
            .iter()
            .enumerate()
            .map(|(track, bone)| {
                Track::new(*bone, frames.iter().map(|frame| frame[track]).collect())
            })
            .collect();
        let clip = AnimationClip::new("round_trip", tracks, None).unwrap();

        let basis = resolve_basis_samples(&skeleton, &clip).unwrap();
        let rebuilt: Vec<BoneBasisTrack> = reconstruct_armature(&skeleton, &basis).unwrap();

        for track in &rebuilt {
            let original = clip.track(&track.bone).unwrap();
            for (a, b) in track.samples.iter().zip(&original.samples) {
                prop_assert!(a.approx_eq(b, 2e-3), "{:?} != {:?}", a, b);
            }
        }
    }
}
