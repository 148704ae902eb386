// src/model/placement.rs

use serde::{Serialize, Deserialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::error::PlacementError;

/// 广告位形态
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdFormat {
    Banner,
    Interstitial,
}

/// **测试广告位**
/// 测试广告位总是会返回一个固定类型的广告，仅用于集成验证，上线前需要移除。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestVariant {
    BannerHtml,
    BannerMraidExpand,
    BannerVideo,
    BannerParallaxHtml,
    BannerParallaxVideo,
    InterstitialHtml,
    InterstitialVideo,
}

impl TestVariant {
    pub const ALL: [TestVariant; 7] = [
        TestVariant::BannerHtml,
        TestVariant::BannerMraidExpand,
        TestVariant::BannerVideo,
        TestVariant::BannerParallaxHtml,
        TestVariant::BannerParallaxVideo,
        TestVariant::InterstitialHtml,
        TestVariant::InterstitialVideo,
    ];

    pub fn format(&self) -> AdFormat {
        match self {
            TestVariant::InterstitialHtml | TestVariant::InterstitialVideo => AdFormat::Interstitial,
            _ => AdFormat::Banner,
        }
    }

    pub fn is_parallax(&self) -> bool {
        matches!(self, TestVariant::BannerParallaxHtml | TestVariant::BannerParallaxVideo)
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self,
            TestVariant::BannerVideo | TestVariant::BannerParallaxVideo | TestVariant::InterstitialVideo
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestVariant::BannerHtml => "banner_html",
            TestVariant::BannerMraidExpand => "banner_mraid_expand",
            TestVariant::BannerVideo => "banner_video",
            TestVariant::BannerParallaxHtml => "banner_parallax_html",
            TestVariant::BannerParallaxVideo => "banner_parallax_video",
            TestVariant::InterstitialHtml => "interstitial_html",
            TestVariant::InterstitialVideo => "interstitial_video",
        }
    }
}

impl FromStr for TestVariant {
    type Err = PlacementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        TestVariant::ALL
            .iter()
            .copied()
            .find(|variant| variant.as_str() == normalized)
            .ok_or_else(|| PlacementError::UnknownTestVariant(value.to_string()))
    }
}

impl fmt::Display for TestVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 广告位身份：站点/页面/格式 三元组，或者测试广告位，二者只能取其一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementIdentity {
    Ids { site_id: i64, page_id: i64, format_id: i64 },
    Test(TestVariant),
}

impl PlacementIdentity {
    pub fn is_test(&self) -> bool {
        matches!(self, PlacementIdentity::Test(_))
    }
}

impl fmt::Display for PlacementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementIdentity::Ids { site_id, page_id, format_id } => {
                write!(f, "{}/{}/{}", site_id, page_id, format_id)
            }
            PlacementIdentity::Test(variant) => write!(f, "test:{}", variant),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    #[serde(default)]
    pub id: Option<String>,
}

impl Segment {
    pub fn new(id: &str) -> Self {
        Self { id: Some(id.to_string()) }
    }
}

/// **卖方定义的受众 / 内容分组**
/// 构造后不可变，受众与内容共用同一结构。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentGroup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
}

impl SegmentGroup {
    pub fn new(id: Option<&str>, name: Option<&str>, segments: Option<Vec<Segment>>) -> Self {
        Self {
            id: id.map(String::from),
            name: name.map(String::from),
            segments,
        }
    }
}

pub type SellerDefinedAudience = SegmentGroup;
pub type SellerDefinedContent = SegmentGroup;

/// 配置文件中的广告位表示（扁平结构）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PlacementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_ad: Option<TestVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_targeting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_defined_audiences: Option<Vec<SellerDefinedAudience>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_defined_contents: Option<Vec<SellerDefinedContent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_chain_object_string: Option<String>,
}

/// **广告位配置**
///
/// 身份和关键词在构造时确定；受众、内容和 supply chain 字符串各自只能在第一次
/// `load` 之前设置一次，之后广告位被冻结。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "PlacementSpec", into = "PlacementSpec")]
pub struct PlacementConfig {
    identity: PlacementIdentity,
    keyword_targeting: Option<String>,
    seller_defined_audiences: Option<Vec<SellerDefinedAudience>>,
    seller_defined_contents: Option<Vec<SellerDefinedContent>>,
    supply_chain_object_string: Option<String>,
    frozen: bool,
}

impl PlacementConfig {
    pub fn new(site_id: i64, page_id: i64, format_id: i64) -> Self {
        Self::from_identity(PlacementIdentity::Ids { site_id, page_id, format_id }, None)
    }

    pub fn with_keywords(site_id: i64, page_id: i64, format_id: i64, keyword_targeting: &str) -> Self {
        Self::from_identity(
            PlacementIdentity::Ids { site_id, page_id, format_id },
            Some(keyword_targeting.to_string()),
        )
    }

    pub fn test_ad(variant: TestVariant) -> Self {
        Self::from_identity(PlacementIdentity::Test(variant), None)
    }

    fn from_identity(identity: PlacementIdentity, keyword_targeting: Option<String>) -> Self {
        Self {
            identity,
            keyword_targeting,
            seller_defined_audiences: None,
            seller_defined_contents: None,
            supply_chain_object_string: None,
            frozen: false,
        }
    }

    pub fn identity(&self) -> PlacementIdentity {
        self.identity
    }

    pub fn site_id(&self) -> Option<i64> {
        match self.identity {
            PlacementIdentity::Ids { site_id, .. } => Some(site_id),
            PlacementIdentity::Test(_) => None,
        }
    }

    pub fn page_id(&self) -> Option<i64> {
        match self.identity {
            PlacementIdentity::Ids { page_id, .. } => Some(page_id),
            PlacementIdentity::Test(_) => None,
        }
    }

    pub fn format_id(&self) -> Option<i64> {
        match self.identity {
            PlacementIdentity::Ids { format_id, .. } => Some(format_id),
            PlacementIdentity::Test(_) => None,
        }
    }

    pub fn test_variant(&self) -> Option<TestVariant> {
        match self.identity {
            PlacementIdentity::Test(variant) => Some(variant),
            PlacementIdentity::Ids { .. } => None,
        }
    }

    pub fn keyword_targeting(&self) -> Option<&str> {
        self.keyword_targeting.as_deref()
    }

    pub fn seller_defined_audiences(&self) -> Option<&[SellerDefinedAudience]> {
        self.seller_defined_audiences.as_deref()
    }

    pub fn seller_defined_contents(&self) -> Option<&[SellerDefinedContent]> {
        self.seller_defined_contents.as_deref()
    }

    pub fn supply_chain_object_string(&self) -> Option<&str> {
        self.supply_chain_object_string.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_seller_defined_audiences(
        &mut self,
        audiences: Vec<SellerDefinedAudience>,
    ) -> Result<(), PlacementError> {
        let frozen = self.frozen;
        set_once(&mut self.seller_defined_audiences, audiences, "seller_defined_audiences", frozen)
    }

    pub fn set_seller_defined_contents(
        &mut self,
        contents: Vec<SellerDefinedContent>,
    ) -> Result<(), PlacementError> {
        let frozen = self.frozen;
        set_once(&mut self.seller_defined_contents, contents, "seller_defined_contents", frozen)
    }

    pub fn set_supply_chain_object_string(&mut self, schain: &str) -> Result<(), PlacementError> {
        let frozen = self.frozen;
        set_once(
            &mut self.supply_chain_object_string,
            schain.to_string(),
            "supply_chain_object_string",
            frozen,
        )
    }

    /// 第一次 load 时由会话控制器调用
    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    field: &'static str,
    frozen: bool,
) -> Result<(), PlacementError> {
    if frozen {
        return Err(PlacementError::Frozen { field });
    }
    if slot.is_some() {
        return Err(PlacementError::AlreadySet { field });
    }
    *slot = Some(value);
    Ok(())
}

impl TryFrom<PlacementSpec> for PlacementConfig {
    type Error = PlacementError;

    fn try_from(spec: PlacementSpec) -> Result<Self, Self::Error> {
        let ids = (spec.site_id, spec.page_id, spec.format_id);
        let identity = match (ids, spec.test_ad) {
            ((Some(site_id), Some(page_id), Some(format_id)), None) => {
                PlacementIdentity::Ids { site_id, page_id, format_id }
            }
            ((None, None, None), Some(variant)) => PlacementIdentity::Test(variant),
            (_, None) => return Err(PlacementError::MissingIdentity),
            (_, Some(_)) => return Err(PlacementError::ConflictingIdentity),
        };
        if identity.is_test() && spec.keyword_targeting.is_some() {
            return Err(PlacementError::ConflictingIdentity);
        }
        Ok(Self {
            identity,
            keyword_targeting: spec.keyword_targeting,
            seller_defined_audiences: spec.seller_defined_audiences,
            seller_defined_contents: spec.seller_defined_contents,
            supply_chain_object_string: spec.supply_chain_object_string,
            frozen: false,
        })
    }
}

impl From<PlacementConfig> for PlacementSpec {
    fn from(placement: PlacementConfig) -> Self {
        let mut spec = PlacementSpec {
            keyword_targeting: placement.keyword_targeting,
            seller_defined_audiences: placement.seller_defined_audiences,
            seller_defined_contents: placement.seller_defined_contents,
            supply_chain_object_string: placement.supply_chain_object_string,
            ..PlacementSpec::default()
        };
        match placement.identity {
            PlacementIdentity::Ids { site_id, page_id, format_id } => {
                spec.site_id = Some(site_id);
                spec.page_id = Some(page_id);
                spec.format_id = Some(format_id);
            }
            PlacementIdentity::Test(variant) => spec.test_ad = Some(variant),
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ids_placement_exposes_triple() {
        let placement = PlacementConfig::with_keywords(507206, 1579908, 15048, "header01");
        assert_eq!(placement.site_id(), Some(507206));
        assert_eq!(placement.page_id(), Some(1579908));
        assert_eq!(placement.format_id(), Some(15048));
        assert_eq!(placement.keyword_targeting(), Some("header01"));
        assert_eq!(placement.test_variant(), None);
        assert_eq!(placement.identity().to_string(), "507206/1579908/15048");
    }

    #[test]
    fn test_placement_has_no_ids() {
        let placement = PlacementConfig::test_ad(TestVariant::BannerParallaxVideo);
        assert_eq!(placement.site_id(), None);
        assert_eq!(placement.test_variant(), Some(TestVariant::BannerParallaxVideo));
        assert!(placement.identity().is_test());
        assert_eq!(placement.identity().to_string(), "test:banner_parallax_video");
    }

    #[test]
    fn variant_metadata() {
        assert_eq!(TestVariant::InterstitialVideo.format(), AdFormat::Interstitial);
        assert_eq!(TestVariant::BannerMraidExpand.format(), AdFormat::Banner);
        assert!(TestVariant::BannerParallaxHtml.is_parallax());
        assert!(!TestVariant::BannerHtml.is_parallax());
        assert!(TestVariant::BannerVideo.is_video());
        assert_eq!("Interstitial-HTML".parse::<TestVariant>().unwrap(), TestVariant::InterstitialHtml);
        assert!(matches!(
            "popup".parse::<TestVariant>(),
            Err(PlacementError::UnknownTestVariant(v)) if v == "popup"
        ));
    }

    #[test]
    fn optional_fields_are_set_once() {
        let mut placement = PlacementConfig::new(1, 2, 3);
        placement.set_supply_chain_object_string("1.0,1!exchange1.com,1234,1").unwrap();
        let err = placement.set_supply_chain_object_string("other").unwrap_err();
        assert!(matches!(err, PlacementError::AlreadySet { field: "supply_chain_object_string" }));
        assert_eq!(placement.supply_chain_object_string(), Some("1.0,1!exchange1.com,1234,1"));

        let audience = SegmentGroup::new(Some("aud-1"), Some("sports"), Some(vec![Segment::new("s1")]));
        placement.set_seller_defined_audiences(vec![audience.clone()]).unwrap();
        assert_eq!(placement.seller_defined_audiences(), Some(&[audience][..]));
    }

    #[test]
    fn frozen_placement_rejects_updates() {
        let mut placement = PlacementConfig::new(1, 2, 3);
        placement.freeze();
        let err = placement
            .set_seller_defined_contents(vec![SegmentGroup::default()])
            .unwrap_err();
        assert!(matches!(err, PlacementError::Frozen { field: "seller_defined_contents" }));
        assert!(placement.seller_defined_contents().is_none());
    }

    #[test]
    fn deserialize_ids_and_test_placements() {
        let placement: PlacementConfig = serde_json::from_str(
            r#"{"site_id":1,"page_id":2,"format_id":3,"keyword_targeting":"k=v",
                "seller_defined_contents":[{"id":"c1","segments":[{"id":"seg"}]}]}"#,
        )
        .unwrap();
        assert_eq!(placement.identity(), PlacementIdentity::Ids { site_id: 1, page_id: 2, format_id: 3 });
        assert_eq!(placement.seller_defined_contents().map(|c| c.len()), Some(1));

        let test: PlacementConfig = serde_json::from_str(r#"{"test_ad":"interstitial_video"}"#).unwrap();
        assert_eq!(test.test_variant(), Some(TestVariant::InterstitialVideo));
    }

    #[test]
    fn deserialize_rejects_ambiguous_identity() {
        let both = serde_json::from_str::<PlacementConfig>(
            r#"{"site_id":1,"page_id":2,"format_id":3,"test_ad":"banner_html"}"#,
        );
        assert!(both.is_err());
        let partial = serde_json::from_str::<PlacementConfig>(r#"{"site_id":1,"page_id":2}"#);
        assert!(partial.is_err());
        let none = serde_json::from_str::<PlacementConfig>(r#"{"keyword_targeting":"x"}"#);
        assert!(none.is_err());
    }

    fn segment_groups() -> impl Strategy<Value = Option<Vec<SegmentGroup>>> {
        let segment = proptest::option::of("[a-z0-9]{1,6}").prop_map(|id| Segment { id });
        let group = (
            proptest::option::of("[a-z0-9]{1,8}"),
            proptest::option::of("[a-z .]{0,12}"),
            proptest::option::of(proptest::collection::vec(segment, 0..4)),
        )
            .prop_map(|(id, name, segments)| SegmentGroup { id, name, segments });
        proptest::option::of(proptest::collection::vec(group, 0..3))
    }

    fn identities() -> impl Strategy<Value = PlacementIdentity> {
        prop_oneof![
            (any::<i64>(), any::<i64>(), any::<i64>()).prop_map(|(site_id, page_id, format_id)| {
                PlacementIdentity::Ids { site_id, page_id, format_id }
            }),
            proptest::sample::select(TestVariant::ALL.to_vec()).prop_map(PlacementIdentity::Test),
        ]
    }

    fn placements() -> impl Strategy<Value = PlacementConfig> {
        (
            identities(),
            proptest::option::of("[a-z0-9=;]{1,16}"),
            segment_groups(),
            segment_groups(),
            proptest::option::of("[ -~]{0,24}"),
        )
            .prop_map(|(identity, keywords, audiences, contents, schain)| PlacementConfig {
                identity,
                // 测试广告位不带关键词
                keyword_targeting: if identity.is_test() { None } else { keywords },
                seller_defined_audiences: audiences,
                seller_defined_contents: contents,
                supply_chain_object_string: schain,
                frozen: false,
            })
    }

    proptest! {
        #[test]
        fn placement_survives_json(placement in placements()) {
            let json = serde_json::to_string(&placement).unwrap();
            let parsed: PlacementConfig = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, placement);
        }

        #[test]
        fn identity_must_be_exactly_one(
            site_id in proptest::option::of(any::<i64>()),
            page_id in proptest::option::of(any::<i64>()),
            format_id in proptest::option::of(any::<i64>()),
            test_ad in proptest::option::of(proptest::sample::select(TestVariant::ALL.to_vec())),
        ) {
            let spec = PlacementSpec { site_id, page_id, format_id, test_ad, ..PlacementSpec::default() };
            let all_ids = site_id.is_some() && page_id.is_some() && format_id.is_some();
            let no_ids = site_id.is_none() && page_id.is_none() && format_id.is_none();
            let valid = (all_ids && test_ad.is_none()) || (no_ids && test_ad.is_some());
            let result = PlacementConfig::try_from(spec);
            prop_assert_eq!(result.is_ok(), valid);
            if !valid {
                let conflicting = matches!(result, Err(PlacementError::ConflictingIdentity));
                prop_assert_eq!(conflicting, test_ad.is_some());
            }
        }
    }
}
