use std::sync::Arc;

use skelmesh_pose::prelude::*;

#[test]
fn attachments_follow_their_bones() -> anyhow::Result<()> {
    let material = Handle::<Material>::new();
    let region = RegionAttachment::new(
        "head",
        material,
        &RegionLayout {
            size: Vec2::new(2.0, 2.0),
            ..Default::default()
        },
    );
    let mesh = MeshAttachment::new(
        "cape",
        material,
        MeshVertices::Rigid(vec![Vec2::ZERO, Vec2::X, Vec2::Y]),
        vec![Vec2::ZERO, Vec2::X, Vec2::Y],
        vec![0, 1, 2],
    )?;

    let mut skeleton = Skeleton::new(
        vec![Bone::new("root"), Bone::new("body")],
        vec![
            Slot::new("head", 0).with_attachment(Attachment::Region(region)),
            Slot::new("cape", 1).with_attachment(Attachment::Mesh(mesh)),
        ],
    )?;
    skeleton.bones_mut()[0].world = Affine2::from_translation(Vec2::new(10.0, 0.0));
    skeleton.bones_mut()[1].world = Affine2::from_scale(Vec2::splat(2.0));

    let mut out = Vec::new();
    let slot = &skeleton.slots()[0];
    let attachment = slot.attachment().cloned().ok_or(anyhow::anyhow!("no attachment"))?;
    let bone = skeleton.slot_bone(slot).ok_or(anyhow::anyhow!("no bone"))?;
    attachment.compute_world_vertices(skeleton.bones(), bone, &slot.deform, &mut out);
    assert_eq!(
        out,
        vec![
            Vec2::new(9.0, -1.0),
            Vec2::new(9.0, 1.0),
            Vec2::new(11.0, 1.0),
            Vec2::new(11.0, -1.0),
        ]
    );
    assert_eq!(attachment.raw_vertex_count(), 4);
    assert_eq!(attachment.triangles(), &REGION_TRIANGLES);

    skeleton.set_deform(1, vec![Vec2::ZERO, Vec2::new(0.5, 0.0), Vec2::new(0.0, 0.5)])?;
    let slot = &skeleton.slots()[1];
    let attachment = slot.attachment().cloned().ok_or(anyhow::anyhow!("no attachment"))?;
    let bone = skeleton.slot_bone(slot).ok_or(anyhow::anyhow!("no bone"))?;
    attachment.compute_world_vertices(skeleton.bones(), bone, &slot.deform, &mut out);
    assert_eq!(out, vec![Vec2::ZERO, Vec2::X, Vec2::Y]);

    Ok(())
}

#[test]
fn swapping_attachments_changes_identity() -> anyhow::Result<()> {
    let material = Handle::<Material>::new();
    let layout = RegionLayout::default();
    let a = Arc::new(Attachment::Region(RegionAttachment::new("a", material, &layout)));
    let b = Arc::new(Attachment::Region(RegionAttachment::new("b", material, &layout)));
    assert_ne!(a.id(), b.id());

    let mut skeleton = Skeleton::new(vec![Bone::new("root")], vec![Slot::new("s", 0)])?;
    skeleton.set_attachment(0, Some(a.clone()))?;
    let first = skeleton.slots()[0].attachment().map(|a| a.id());
    skeleton.set_attachment(0, Some(b))?;
    let second = skeleton.slots()[0].attachment().map(|a| a.id());

    assert_eq!(first, Some(a.id()));
    assert_ne!(first, second);
    Ok(())
}
