// (exp(p-max_p))^(1/T) = exp((p-max_p)/T).
pub fn softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    let mut probabilities = logits.to_vec();
    let mask = vec![true; logits.len()];
    masked_softmax_in_place(&mut probabilities, &mask, temperature, 0.0);

    probabilities
}

/// Softmaxes the entries where `mask` is set and writes `masked_value` everywhere else.
/// When no entry is set every entry ends up as `masked_value`.
pub fn masked_softmax_in_place(logits: &mut [f32], mask: &[bool], temperature: f32, masked_value: f32) {
    debug_assert_eq!(logits.len(), mask.len());

    let max_p = logits
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|(&p, _)| p)
        .fold(f32::MIN, f32::max);

    let mut sum = 0.0;
    for (p, &m) in logits.iter_mut().zip(mask) {
        if m {
            *p = ((*p - max_p) / temperature).exp();
            sum += *p;
        } else {
            *p = masked_value;
        }
    }

    if sum > 0.0 {
        for (p, &m) in logits.iter_mut().zip(mask) {
            if m {
                *p /= sum;
            }
        }
    }
}
