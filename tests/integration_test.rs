use glam::{Mat4, Vec3};
use meshlet_renderer::culling::{cull_candidates, is_selected_lod};
use meshlet_renderer::hierarchy::{
    ClusterBounds, ClusterHierarchy, ErrorBounds, GroupError, Instance, Meshlet, ERROR_INFINITE,
};
use meshlet_renderer::resources::build_candidates;
use meshlet_renderer::uniforms::{Camera, CullingConfig};

// 两层、每层一个簇的最小层级：簇 0 是叶子，簇 1 是它的父级
fn two_level_hierarchy() -> ClusterHierarchy {
    let shared_group = GroupError {
        center: [0.0; 3],
        radius: 0.5,
        error: 1.0,
    };
    ClusterHierarchy {
        vertices: vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
        ],
        vertex_stride_floats: 3,
        meshlets: vec![
            Meshlet {
                vertex_offset: 0,
                triangle_offset: 0,
                vertex_count: 3,
                triangle_count: 1,
            };
            2
        ],
        meshlet_vertices: vec![0, 1, 2],
        meshlet_triangles: vec![0, 1, 2],
        error_bounds: vec![
            ErrorBounds {
                parent: shared_group,
                cluster: GroupError {
                    center: [0.0; 3],
                    radius: 0.5,
                    error: 0.0,
                },
            },
            ErrorBounds {
                parent: GroupError {
                    center: [0.0; 3],
                    radius: 0.0,
                    error: ERROR_INFINITE,
                },
                cluster: shared_group,
            },
        ],
        cluster_bounds: vec![
            ClusterBounds {
                center: [0.0; 3],
                radius: 1.0,
            };
            2
        ],
        lod_offsets: vec![0, 1],
        max_cluster_triangles: 128,
    }
}

fn camera_at(distance: f32) -> Camera {
    let position = Vec3::new(0.0, 0.0, distance);
    Camera {
        view: Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y),
        projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
        position,
    }
}

#[test]
fn test_hierarchy_validates() {
    assert!(two_level_hierarchy().validate().is_ok());
}

#[test]
fn test_cpu_pipeline_selects_one_lod_per_frame() {
    let hierarchy = two_level_hierarchy();
    let instances = [Instance::default()];
    let candidates = build_candidates(hierarchy.num_clusters() as u32, 1);
    let config = CullingConfig::default();

    // 视锥内的任意距离都恰好有一个簇幸存
    for step in 1..40 {
        let camera = camera_at(2.0 + step as f32 * 2.0);
        let survivors = cull_candidates(
            &candidates,
            &instances,
            &hierarchy.error_bounds,
            &hierarchy.cluster_bounds,
            &camera,
            &config,
        );
        assert_eq!(
            survivors.len(),
            1,
            "distance {}: expected exactly one visible cluster",
            2.0 + step as f32 * 2.0
        );
    }
}

#[test]
fn test_cpu_pipeline_lod_switches_with_distance() {
    let hierarchy = two_level_hierarchy();
    let config = CullingConfig::default();

    // 近处细节层级（叶子），远处粗层级（父级）
    let near = camera_at(1.2);
    assert!(is_selected_lod(
        &Mat4::IDENTITY,
        &hierarchy.error_bounds[0],
        near.position,
        &config
    ));
    let far = camera_at(50.0);
    assert!(is_selected_lod(
        &Mat4::IDENTITY,
        &hierarchy.error_bounds[1],
        far.position,
        &config
    ));
}

#[test]
fn test_cpu_pipeline_culls_everything_behind_far_plane() {
    let hierarchy = two_level_hierarchy();
    // 实例被移到远平面之外
    let instances = [Instance::from_matrix(Mat4::from_translation(Vec3::new(
        0.0, 0.0, -400.0,
    )))];
    let candidates = build_candidates(hierarchy.num_clusters() as u32, 1);
    let survivors = cull_candidates(
        &candidates,
        &instances,
        &hierarchy.error_bounds,
        &hierarchy.cluster_bounds,
        &camera_at(2.0),
        &CullingConfig::default(),
    );
    assert!(survivors.is_empty());
}

#[test]
fn test_cpu_pipeline_multiple_instances() {
    let hierarchy = two_level_hierarchy();
    // 一个实例在视锥内，一个在侧面之外
    let instances = [
        Instance::default(),
        Instance::from_matrix(Mat4::from_translation(Vec3::new(500.0, 0.0, 0.0))),
    ];
    let candidates = build_candidates(hierarchy.num_clusters() as u32, 2);
    assert_eq!(candidates.len(), 4);

    let survivors = cull_candidates(
        &candidates,
        &instances,
        &hierarchy.error_bounds,
        &hierarchy.cluster_bounds,
        &camera_at(4.0),
        &CullingConfig::default(),
    );
    // 只有视锥内的实例贡献一个选中的簇
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].instance_index, 0);
}
