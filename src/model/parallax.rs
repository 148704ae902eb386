// src/model/parallax.rs

use serde::{Serialize, Deserialize};
use std::ops::Add;

/// **视差广告边距**
/// 用于让视差广告避开导航栏、标签栏等固定 UI，默认四边均为 0。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct ParallaxMargins {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ParallaxMargins {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// 返回两个边距逐分量相加后的新实例
    pub fn add(self, other: ParallaxMargins) -> ParallaxMargins {
        ParallaxMargins {
            left: self.left + other.left,
            top: self.top + other.top,
            right: self.right + other.right,
            bottom: self.bottom + other.bottom,
        }
    }
}

impl Add for ParallaxMargins {
    type Output = ParallaxMargins;

    fn add(self, other: ParallaxMargins) -> ParallaxMargins {
        ParallaxMargins::add(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // 整数值的 f64 相加是精确的，结合律可以直接比较
    fn margins() -> impl Strategy<Value = ParallaxMargins> {
        (0u16..2000, 0u16..2000, 0u16..2000, 0u16..2000).prop_map(|(l, t, r, b)| {
            ParallaxMargins::new(l as f64, t as f64, r as f64, b as f64)
        })
    }

    #[test]
    fn default_is_all_zero() {
        let m = ParallaxMargins::default();
        assert_eq!(m, ParallaxMargins::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(m, ParallaxMargins::zero());
    }

    #[test]
    fn add_sums_each_side() {
        let nav_bar = ParallaxMargins::new(0.0, 64.0, 0.0, 0.0);
        let tab_bar = ParallaxMargins::new(0.0, 0.0, 0.0, 49.0);
        let total = nav_bar.add(tab_bar);
        assert_eq!(total, ParallaxMargins::new(0.0, 64.0, 0.0, 49.0));
        assert_eq!(nav_bar + tab_bar, total);
    }

    proptest! {
        #[test]
        fn zero_is_identity(m in margins()) {
            prop_assert_eq!(ParallaxMargins::zero().add(m), m);
            prop_assert_eq!(m.add(ParallaxMargins::zero()), m);
        }

        #[test]
        fn add_is_commutative(a in margins(), b in margins()) {
            prop_assert_eq!(a.add(b), b.add(a));
        }

        #[test]
        fn add_is_associative(a in margins(), b in margins(), c in margins()) {
            prop_assert_eq!(a.add(b).add(c), a.add(b.add(c)));
        }
    }
}
