use crate::context::Dialect;
use crate::render::{self, Context, Program, Uniform};

use rustc_hash::FxHashMap;
use std::ops::BitOr;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Shading,
    Bloom,
    Sunrays,
    ManualFiltering,
}

impl Keyword {
    const ALL: [Keyword; 4] = [
        Keyword::Shading,
        Keyword::Bloom,
        Keyword::Sunrays,
        Keyword::ManualFiltering,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn define(self) -> &'static str {
        match self {
            Keyword::Shading => "SHADING",
            Keyword::Bloom => "BLOOM",
            Keyword::Sunrays => "SUNRAYS",
            Keyword::ManualFiltering => "MANUAL_FILTERING",
        }
    }
}

/// A set of shader features. Each set maps to one compiled variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Keywords(u8);

impl Keywords {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, keyword: Keyword) -> bool {
        self.0 & keyword.bit() != 0
    }

    pub fn insert(&mut self, keyword: Keyword) {
        self.0 |= keyword.bit();
    }

    pub fn defines(&self) -> Vec<&'static str> {
        Keyword::ALL
            .iter()
            .filter(|keyword| self.contains(**keyword))
            .map(|keyword| keyword.define())
            .collect()
    }
}

impl From<Keyword> for Keywords {
    fn from(keyword: Keyword) -> Self {
        Self(keyword.bit())
    }
}

impl BitOr<Keyword> for Keywords {
    type Output = Keywords;

    fn bitor(mut self, keyword: Keyword) -> Keywords {
        self.insert(keyword);
        self
    }
}

impl FromIterator<Keyword> for Keywords {
    fn from_iter<I: IntoIterator<Item = Keyword>>(keywords: I) -> Self {
        keywords
            .into_iter()
            .fold(Keywords::empty(), |set, keyword| set | keyword)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// The requested variant was already active.
    Unchanged,
    /// A cached variant became active.
    Switched,
    /// The variant was compiled and became active.
    Compiled,
}

/// Compiled variants keyed by keyword set, with one of them active.
pub struct VariantCache<P> {
    variants: FxHashMap<Keywords, P>,
    active: Option<Keywords>,
}

impl<P> Default for VariantCache<P> {
    fn default() -> Self {
        Self {
            variants: FxHashMap::default(),
            active: None,
        }
    }
}

impl<P> VariantCache<P> {
    pub fn activate<F, E>(&mut self, keywords: Keywords, compile: F) -> Result<Activation, E>
    where
        F: FnOnce(Keywords) -> Result<P, E>,
    {
        if self.active == Some(keywords) {
            return Ok(Activation::Unchanged);
        }

        let activation = if self.variants.contains_key(&keywords) {
            Activation::Switched
        } else {
            let variant = compile(keywords)?;
            self.variants.insert(keywords, variant);
            Activation::Compiled
        };

        self.active = Some(keywords);
        Ok(activation)
    }

    pub fn active(&self) -> Option<&P> {
        self.active.and_then(|keywords| self.variants.get(&keywords))
    }

    #[cfg(test)]
    fn active_keywords(&self) -> Option<Keywords> {
        self.active
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.variants.len()
    }
}

/// A shader pair whose fragment stage is compiled on demand for each keyword
/// set it is used with.
pub struct Material {
    context: Context,
    dialect: Dialect,
    vertex_shader: &'static str,
    fragment_shader: &'static str,
    variants: VariantCache<Program>,
}

impl Material {
    pub fn new(
        context: &Context,
        dialect: Dialect,
        shaders: (&'static str, &'static str),
    ) -> Self {
        Self {
            context: Rc::clone(context),
            dialect,
            vertex_shader: shaders.0,
            fragment_shader: shaders.1,
            variants: VariantCache::default(),
        }
    }

    pub fn with_keywords(
        context: &Context,
        dialect: Dialect,
        shaders: (&'static str, &'static str),
        keywords: Keywords,
    ) -> Result<Self, render::Problem> {
        let mut material = Self::new(context, dialect, shaders);
        material.set_keywords(keywords)?;
        Ok(material)
    }

    /// Select the variant for `keywords`, compiling it on first use.
    pub fn set_keywords(&mut self, keywords: Keywords) -> Result<Activation, render::Problem> {
        let Self {
            context,
            dialect,
            vertex_shader,
            fragment_shader,
            variants,
        } = self;

        let activation = variants.activate(keywords, |keywords| {
            log::debug!("Compiling shader variant {:?}", keywords.defines());
            Program::new_with_defines(
                context,
                dialect,
                (*vertex_shader, *fragment_shader),
                &keywords.defines(),
            )
        })?;

        Ok(activation)
    }

    pub fn program(&self) -> Option<&Program> {
        self.variants.active()
    }

    pub fn bind(&self) {
        if let Some(program) = self.program() {
            program.bind();
        }
    }

    pub fn set_uniforms(&self, uniforms: &[&Uniform]) {
        if let Some(program) = self.program() {
            program.set_uniforms(uniforms);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn compile_counting(count: &mut u32) -> impl FnOnce(Keywords) -> Result<Keywords, ()> + '_ {
        move |keywords| {
            *count += 1;
            Ok(keywords)
        }
    }

    #[test]
    fn test_keyword_sets_ignore_order() {
        let a: Keywords = [Keyword::Shading, Keyword::Bloom, Keyword::Sunrays]
            .into_iter()
            .collect();
        let b: Keywords = [Keyword::Sunrays, Keyword::Shading, Keyword::Bloom, Keyword::Bloom]
            .into_iter()
            .collect();

        assert_eq!(a, b);
        assert_eq!(a.defines(), vec!["SHADING", "BLOOM", "SUNRAYS"]);
    }

    #[test]
    fn test_same_keywords_reuse_the_active_variant() {
        let mut cache = VariantCache::default();
        let mut compiled = 0;
        let keywords = Keywords::from(Keyword::Shading) | Keyword::Bloom;
        let reordered = Keywords::from(Keyword::Bloom) | Keyword::Shading;

        assert_eq!(
            cache.activate(keywords, compile_counting(&mut compiled)),
            Ok(Activation::Compiled)
        );
        assert_eq!(
            cache.activate(reordered, compile_counting(&mut compiled)),
            Ok(Activation::Unchanged)
        );
        assert_eq!(compiled, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_switching_back_uses_the_cache() {
        let mut cache = VariantCache::default();
        let mut compiled = 0;
        let plain = Keywords::empty();
        let shaded = Keywords::from(Keyword::Shading);

        cache.activate(plain, compile_counting(&mut compiled)).unwrap();
        cache.activate(shaded, compile_counting(&mut compiled)).unwrap();
        assert_eq!(cache.active(), Some(&shaded));

        assert_eq!(
            cache.activate(plain, compile_counting(&mut compiled)),
            Ok(Activation::Switched)
        );
        assert_eq!(cache.active(), Some(&plain));
        assert_eq!(compiled, 2);
    }

    #[test]
    fn test_failed_compile_keeps_the_previous_variant() {
        let mut cache: VariantCache<Keywords> = VariantCache::default();
        let plain = Keywords::empty();
        cache.activate(plain, |k| Ok::<_, ()>(k)).unwrap();

        let result = cache.activate(Keywords::from(Keyword::Bloom), |_| Err(()));
        assert_eq!(result, Err(()));
        assert_eq!(cache.active_keywords(), Some(plain));
    }
}
