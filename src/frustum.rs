//! 视锥体平面提取与可见性测试
//!
//! 从视图投影矩阵提取 5 个世界空间平面（左、右、上、下、远）。
//! 近平面有意排除：误差投影阶段已经把相机附近的距离钳制到 z_near，
//! 紧贴相机的簇必须保留。

use glam::{Mat4, Vec3, Vec4};

/// 平面表示：`normal · p + distance >= 0` 为内侧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// 法向量（指向视锥内侧）
    pub normal: Vec3,
    /// 原点到平面的有符号距离项
    pub distance: f32,
}

impl Plane {
    /// 从 4 分量平面系数提取平面，并按 (x, y, z) 模长归一化
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.truncate();
        let len = normal.length();
        if len > 1e-4 {
            Self {
                normal: normal / len,
                distance: coefficients.w / len,
            }
        } else {
            // 退化平面（例如无穷远平面），测试时恒通过
            Self {
                normal: Vec3::ZERO,
                distance: 0.0,
            }
        }
    }

    /// 点到平面的有符号距离
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// 转为 uniform 布局的 4 分量形式
    pub fn to_array(self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.distance]
    }
}

/// 剔除用的 5 平面视锥体
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// 平面顺序：左、右、上、下、远
    pub planes: [Plane; 5],
}

impl Frustum {
    /// 从视图投影矩阵提取视锥平面
    ///
    /// Gribb & Hartmann：平面系数是 view_proj 转置的列（即行）的线性
    /// 组合。
    pub fn from_view_projection(view_proj: Mat4) -> Self {
        let row0 = view_proj.row(0);
        let row1 = view_proj.row(1);
        let row2 = view_proj.row(2);
        let row3 = view_proj.row(3);

        Self {
            planes: [
                Plane::from_coefficients(row3 + row0), // left
                Plane::from_coefficients(row3 - row0), // right
                Plane::from_coefficients(row3 - row1), // top
                Plane::from_coefficients(row3 + row1), // bottom
                Plane::from_coefficients(row3 - row2), // far
            ],
        }
    }

    /// 检查包围球是否（部分）在视锥内
    pub fn sphere_visible(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) + radius >= 0.0)
    }

    /// 检查点是否在视锥内
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.sphere_visible(point, 0.0)
    }

    /// 转为 uniform 布局
    pub fn to_raw(&self) -> [[f32; 4]; 5] {
        [
            self.planes[0].to_array(),
            self.planes[1].to_array(),
            self.planes[2].to_array(),
            self.planes[3].to_array(),
            self.planes[4].to_array(),
        ]
    }
}
