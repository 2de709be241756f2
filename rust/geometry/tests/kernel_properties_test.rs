// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use bimq_geometry::{
    intersect_solids, project_footprint, surface_area, tessellate, volume, Cylinder, Deadline,
    Error, Isometry3, KernelOptions, Kernel, Point3, Polyhedron, Prism, Solid,
    TessellationOptions, Vector3,
};

fn cuboid(origin: [f64; 3], size: [f64; 3]) -> Solid {
    Solid::from(
        Prism::cuboid(
            Point3::new(origin[0], origin[1], origin[2]),
            size[0],
            size[1],
            size[2],
        )
        .unwrap(),
    )
}

#[test]
fn box_volume_is_product_of_sides() {
    let d = Deadline::none();
    for (a, b, c) in [(2.0, 3.0, 4.0), (0.2, 5.0, 3.0), (12.5, 0.3, 1.0)] {
        let solid = cuboid([1.0, -2.0, 0.5], [a, b, c]);
        assert_relative_eq!(volume(&solid, &d).unwrap(), a * b * c, epsilon = 1e-9);
    }
}

#[test]
fn slab_surface_area_matches_box_formula() {
    let d = Deadline::none();
    let (dx, dy, t) = (5.0, 10.0, 0.25);
    let slab = cuboid([0.0, 0.0, 3.0], [dx, dy, t]);
    let expected = 2.0 * (dx * dy + dx * t + dy * t);
    assert_relative_eq!(surface_area(&slab, &d).unwrap(), expected, epsilon = 1e-9);
}

#[test]
fn metrics_ignore_tessellation_settings() {
    let d = Deadline::none();
    let column = Solid::from(Cylinder::new(Isometry3::identity(), 0.25, 3.0).unwrap());
    let exact = volume(&column, &d).unwrap();
    let coarse = tessellate(&column, 0.05, &TessellationOptions::default(), &d).unwrap();
    let fine = tessellate(&column, 0.0005, &TessellationOptions::default(), &d).unwrap();
    assert!(coarse.signed_volume() < fine.signed_volume());
    assert!(fine.signed_volume() < exact);
    assert_relative_eq!(fine.signed_volume(), exact, max_relative = 1e-2);
}

#[test]
fn clash_with_identical_copy_equals_volume() {
    let d = Deadline::none();
    let options = KernelOptions::default();
    let solids = [
        cuboid([0.0, 0.0, 0.0], [5.0, 0.2, 3.0]),
        Solid::from(
            Polyhedron::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0)).unwrap(),
        ),
        Solid::from(
            Prism::new(
                bimq_geometry::Profile2D::rectangle(0.4, 0.6),
                6.0,
                Isometry3::new(Vector3::new(1.0, 1.0, 3.0), Vector3::new(0.0, 1.2, 0.0)),
            )
            .unwrap(),
        ),
    ];
    for solid in &solids {
        let hit = intersect_solids(solid, solid, &options, &d).unwrap();
        assert_relative_eq!(hit.volume, volume(solid, &d).unwrap(), epsilon = 1e-6);
    }
}

#[test]
fn clash_is_symmetric_across_kernels() {
    let d = Deadline::none();
    let options = KernelOptions::default();
    let wall = cuboid([0.0, 0.0, 0.0], [5.0, 0.2, 3.0]);
    let beam = Solid::from(
        Prism::new(
            bimq_geometry::Profile2D::rectangle(0.3, 0.5),
            4.0,
            Isometry3::new(
                Vector3::new(2.0, -2.0, 2.0),
                Vector3::new(-std::f64::consts::FRAC_PI_2, 0.0, 0.0),
            ),
        )
        .unwrap(),
    );
    let ab = intersect_solids(&wall, &beam, &options, &d).unwrap();
    let ba = intersect_solids(&beam, &wall, &options, &d).unwrap();
    assert_eq!(ab.kernel, Kernel::ConvexClip);
    // 0.3 wide, 0.2 deep, 0.5 tall
    assert_relative_eq!(ab.volume, 0.03, epsilon = 1e-6);
    assert_relative_eq!(ab.volume, ba.volume, epsilon = 1e-9);
}

#[test]
fn touching_walls_do_not_clash() {
    let d = Deadline::none();
    let a = cuboid([0.0, 0.0, 0.0], [5.0, 0.2, 3.0]);
    let b = cuboid([5.0, 0.0, 0.0], [5.0, 0.2, 3.0]);
    let hit = intersect_solids(&a, &b, &KernelOptions::default(), &d).unwrap();
    assert!(hit.volume < 1e-9);
}

#[test]
fn cancelled_deadline_fails_every_operator() {
    let d = Deadline::none();
    d.cancel();
    let solid = cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    assert_eq!(volume(&solid, &d), Err(Error::Timeout));
    assert_eq!(surface_area(&solid, &d), Err(Error::Timeout));
    assert!(matches!(
        intersect_solids(&solid, &solid, &KernelOptions::default(), &d),
        Err(Error::Timeout)
    ));
    assert_eq!(project_footprint(&solid, 1e-3, &d), Err(Error::Timeout));
    assert!(matches!(
        tessellate(&solid, 0.01, &TessellationOptions::default(), &d),
        Err(Error::Timeout)
    ));
}
