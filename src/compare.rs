// ===============================
// src/compare.rs
// ===============================
//
// Structural product equivalence across the two accounts. Side-local ids are
// never compared: images are matched by src, variants by their shared numeric
// reference, options by name. The failure reason is surfaced because the
// caller logs it and it drives whether an update is issued.
//
use thiserror::Error;

use crate::domain::{Product, ProductOption, Variant};

#[derive(Debug, Error, PartialEq)]
pub enum Mismatch {
    #[error("unequal number of images between both products ({source_count} vs {counterpart})")]
    ImageCount { source_count: usize, counterpart: usize },
    #[error("image positions do not match for {src}")]
    ImagePosition { src: String },
    #[error("did not find matches for all images (found {found} of {total})")]
    ImagesUnmatched { found: usize, total: usize },
    #[error("unequal number of variants ({source_count} vs {counterpart})")]
    VariantCount { source_count: usize, counterpart: usize },
    #[error("variants do not match for {source_id} and {counterpart_id}")]
    VariantFields {
        source_id: String,
        counterpart_id: String,
    },
    #[error("did not find all variants (found {found} of {total})")]
    VariantsUnmatched { found: usize, total: usize },
    #[error("unequal number of options ({source_count} vs {counterpart})")]
    OptionCount { source_count: usize, counterpart: usize },
    #[error("options do not match for {name}")]
    OptionFields { name: String },
    #[error("did not find all options (found {found} of {total})")]
    OptionsUnmatched { found: usize, total: usize },
    #[error("products do not match")]
    Fields,
}

/// Decides whether two products are in sync. `Ok(())` means no mutation is
/// needed. Matching takes the first counterpart with the same key and does
/// not remove matched items, so duplicate srcs/references/names within one
/// product have no defined tie-break.
pub fn products_match(source: &Product, counterpart: &Product) -> Result<(), Mismatch> {
    // Images: matched by src, agreement required on position.
    if source.images.len() != counterpart.images.len() {
        return Err(Mismatch::ImageCount {
            source_count: source.images.len(),
            counterpart: counterpart.images.len(),
        });
    }
    let mut found_srcs = 0;
    for image in &source.images {
        for other in &counterpart.images {
            if image.src == other.src {
                found_srcs += 1;
                if image.position != other.position {
                    return Err(Mismatch::ImagePosition {
                        src: image.src.clone(),
                    });
                }
                break;
            }
        }
    }
    if found_srcs != source.images.len() {
        return Err(Mismatch::ImagesUnmatched {
            found: found_srcs,
            total: source.images.len(),
        });
    }

    // Variants: matched by the cross-side numeric reference.
    if source.variants.len() != counterpart.variants.len() {
        return Err(Mismatch::VariantCount {
            source_count: source.variants.len(),
            counterpart: counterpart.variants.len(),
        });
    }
    let mut found_variants = 0;
    for variant in &source.variants {
        for other in &counterpart.variants {
            if variant.variant_ref == other.variant_ref {
                found_variants += 1;
                if !variants_equal(variant, other) {
                    return Err(Mismatch::VariantFields {
                        source_id: variant.id.clone(),
                        counterpart_id: other.id.clone(),
                    });
                }
                break;
            }
        }
    }
    if found_variants != source.variants.len() {
        return Err(Mismatch::VariantsUnmatched {
            found: found_variants,
            total: source.variants.len(),
        });
    }

    // Options: matched by name.
    if source.options.len() != counterpart.options.len() {
        return Err(Mismatch::OptionCount {
            source_count: source.options.len(),
            counterpart: counterpart.options.len(),
        });
    }
    let mut found_options = 0;
    for option in &source.options {
        for other in &counterpart.options {
            if option.name == other.name {
                found_options += 1;
                if !options_equal(option, other) {
                    return Err(Mismatch::OptionFields {
                        name: option.name.clone(),
                    });
                }
                break;
            }
        }
    }
    if found_options != source.options.len() {
        return Err(Mismatch::OptionsUnmatched {
            found: found_options,
            total: source.options.len(),
        });
    }

    // Remaining top-level fields. `active` is policy-mutated and excluded;
    // ids, server timestamps and account-scoped fields are side-local.
    if source.code != counterpart.code
        || source.title != counterpart.title
        || source.body_html != counterpart.body_html
        || source.vendor != counterpart.vendor
        || source.tags != counterpart.tags
        || source.product_type != counterpart.product_type
        || source.attributes != counterpart.attributes
        || source.delisted_updated != counterpart.delisted_updated
    {
        return Err(Mismatch::Fields);
    }

    Ok(())
}

fn variants_equal(a: &Variant, b: &Variant) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.id.clear();
    b.id.clear();
    a == b
}

fn options_equal(a: &ProductOption, b: &ProductOption) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.id.clear();
    b.id.clear();
    a == b
}
