//! Reshaping of a single token id sequence: truncation, sentinel wrapping, padding and masking.
//!
//! Everything here is a pure function over one sequence.  Batch level decisions, like which
//! length to pad to, belong to [`crate::BatchIterator`].
use crate::{InvalidLengthSnafu, Mask, Result, TokenId};
use snafu::OptionExt;

/// Whether a sequence gets wrapped in begin/end sentinel ids when it's truncated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WrapPolicy {
    /// Content only.  Source sequences are never wrapped.
    NoWrap,

    /// `[bos_id] + content + [eos_id]`.
    ///
    /// `bos_id` is whatever the consuming model starts decoding from, which isn't always the
    /// tokenizer's begin-of-sequence id.  See [`crate::DecoderStart`].
    WrapWith { bos_id: TokenId, eos_id: TokenId },
}

impl WrapPolicy {
    /// Number of positions the sentinels take up.
    pub fn overhead(&self) -> usize {
        match self {
            WrapPolicy::NoWrap => 0,
            WrapPolicy::WrapWith { .. } => 2,
        }
    }
}

/// Truncate `seq` so that it fits in `max_len` positions, wrapping it according to `wrap`.
///
/// When wrapping, two of the `max_len` positions are reserved for the sentinels.  Content that
/// doesn't fit is dropped from the end, never from the front.
///
/// Fails with [`crate::BitextError::InvalidLength`] if `max_len` can't even hold the sentinels.
pub fn truncate(seq: &[TokenId], max_len: usize, wrap: WrapPolicy) -> Result<Vec<TokenId>> {
    let budget = ensure_fits_sentinels(max_len, wrap)?;

    let content = &seq[..seq.len().min(budget)];

    Ok(match wrap {
        WrapPolicy::NoWrap => content.to_vec(),
        WrapPolicy::WrapWith { bos_id, eos_id } => {
            let mut wrapped = Vec::with_capacity(content.len() + 2);
            wrapped.push(bos_id);
            wrapped.extend_from_slice(content);
            wrapped.push(eos_id);
            wrapped
        }
    })
}

/// The number of content positions left in `max_len` once the sentinels are accounted for.
pub(crate) fn ensure_fits_sentinels(max_len: usize, wrap: WrapPolicy) -> Result<usize> {
    max_len
        .checked_sub(wrap.overhead())
        .context(InvalidLengthSnafu {
            max_len,
            required: wrap.overhead(),
        })
}

/// Pad `seq` with `pad_id` up to `target_len`, returning the padded sequence and its mask.
///
/// This never shortens anything.  A sequence already at least `target_len` long comes back as it
/// was, with a mask of all ones.
pub fn pad_and_mask(mut seq: Vec<TokenId>, target_len: usize, pad_id: TokenId) -> (Vec<TokenId>, Mask) {
    let len = seq.len();
    let padded_len = len.max(target_len);

    let mut mask = Vec::with_capacity(padded_len);
    mask.resize(len, 1);
    mask.resize(padded_len, 0);

    seq.resize(padded_len, pad_id);

    (seq, mask)
}

/// [`truncate`] then [`pad_and_mask`] to the same length.
///
/// The ids and mask that come back always have the same length.
pub fn trim(
    seq: &[TokenId],
    target_len: usize,
    pad_id: TokenId,
    wrap: WrapPolicy,
) -> Result<(Vec<TokenId>, Mask)> {
    let ids = truncate(seq, target_len, wrap)?;

    Ok(pad_and_mask(ids, target_len, pad_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitextError;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    const WRAP: WrapPolicy = WrapPolicy::WrapWith {
        bos_id: 1,
        eos_id: 2,
    };

    #[test]
    fn truncates_without_padding() {
        assert_eq!(
            (vec![100, 200, 300, 400], vec![1, 1, 1, 1]),
            trim(&[100, 200, 300, 400, 500], 4, 9, WrapPolicy::NoWrap).unwrap()
        );
    }

    #[test]
    fn pads_short_sequences() {
        assert_eq!(
            (
                vec![100, 200, 300, 400, 500, 9, 9, 9, 9],
                vec![1, 1, 1, 1, 1, 0, 0, 0, 0]
            ),
            trim(&[100, 200, 300, 400, 500], 9, 9, WrapPolicy::NoWrap).unwrap()
        );
    }

    #[test]
    fn wrapping_reserves_room_for_sentinels() {
        assert_eq!(
            (vec![1, 100, 200, 2], vec![1, 1, 1, 1]),
            trim(&[100, 200, 300, 400, 500], 4, 9, WRAP).unwrap()
        );
    }

    #[test]
    fn truncation_drops_from_the_end() {
        assert_eq!(vec![7, 8], truncate(&[7, 8, 9], 2, WrapPolicy::NoWrap).unwrap());
        assert_eq!(vec![1, 7, 2], truncate(&[7, 8, 9], 3, WRAP).unwrap());
    }

    #[test]
    fn empty_sequences() {
        assert_eq!(
            (vec![0, 0, 0], vec![0, 0, 0]),
            trim(&[], 3, 0, WrapPolicy::NoWrap).unwrap()
        );
        assert_eq!(
            (vec![1, 2, 0], vec![1, 1, 0]),
            trim(&[], 3, 0, WRAP).unwrap()
        );
        assert_eq!(
            (Vec::<TokenId>::new(), Vec::<u8>::new()),
            trim(&[], 0, 0, WrapPolicy::NoWrap).unwrap()
        );
    }

    #[test]
    fn exactly_two_positions_holds_only_sentinels() {
        assert_eq!(vec![1, 2], truncate(&[5, 6], 2, WRAP).unwrap());
    }

    #[test]
    fn too_short_for_sentinels_is_rejected() {
        assert_matches!(
            truncate(&[5, 6], 1, WRAP),
            Err(BitextError::InvalidLength {
                max_len: 1,
                required: 2
            })
        );
        assert_matches!(
            trim(&[], 0, 0, WRAP),
            Err(BitextError::InvalidLength { .. })
        );
    }

    #[test]
    fn padding_never_shortens() {
        assert_eq!(
            (vec![4, 5, 6], vec![1, 1, 1]),
            pad_and_mask(vec![4, 5, 6], 2, 0)
        );
    }

    fn wrap_strategy() -> impl Strategy<Value = WrapPolicy> {
        prop_oneof![
            Just(WrapPolicy::NoWrap),
            (0usize..10, 0usize..10).prop_map(|(bos_id, eos_id)| WrapPolicy::WrapWith { bos_id, eos_id }),
        ]
    }

    proptest! {
        #[test]
        fn padding_is_idempotent(seq in prop::collection::vec(10usize..1000, 0..32), extra in 0usize..16) {
            let target_len = seq.len() + extra;
            let (once, _) = pad_and_mask(seq, target_len, 0);
            let (twice, twice_mask) = pad_and_mask(once.clone(), target_len, 0);

            // Already full length, so nothing is added and every position counts as content
            prop_assert_eq!(&once, &twice);
            prop_assert!(twice_mask.iter().all(|&m| m == 1));
        }

        #[test]
        fn ids_and_mask_have_the_same_length(
            seq in prop::collection::vec(10usize..1000, 0..32),
            target_len in 2usize..40,
            wrap in wrap_strategy(),
        ) {
            let (ids, mask) = trim(&seq, target_len, 0, wrap).unwrap();

            prop_assert_eq!(ids.len(), mask.len());
            prop_assert_eq!(ids.len(), target_len);
            prop_assert!(mask.iter().all(|&m| m <= 1));
        }

        #[test]
        fn wrapped_sequences_keep_their_sentinels(
            seq in prop::collection::vec(10usize..1000, 0..32),
            max_len in 3usize..40,
        ) {
            let ids = truncate(&seq, max_len, WRAP).unwrap();

            prop_assert_eq!(ids.first(), Some(&1));
            prop_assert_eq!(ids.last(), Some(&2));
            prop_assert!(ids.len() <= max_len);
        }

        #[test]
        fn mask_marks_exactly_the_non_padding_positions(
            seq in prop::collection::vec(10usize..1000, 0..32),
            target_len in 0usize..40,
        ) {
            let original_len = seq.len();
            let (ids, mask) = pad_and_mask(seq, target_len, 0);

            for (i, (&id, &m)) in ids.iter().zip(mask.iter()).enumerate() {
                prop_assert_eq!(m == 1, i < original_len);
                prop_assert_eq!(id == 0, i >= original_len);
            }
        }
    }
}
