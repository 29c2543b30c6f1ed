use std::collections::HashSet;

use rand::Rng;

/// Coach prefix, rows and seats per row for a travel class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPattern {
    pub prefix: char,
    pub rows: u32,
    pub seats_per_row: u32,
}

impl SeatPattern {
    pub fn for_class(travel_class: &str) -> Self {
        let (prefix, rows, seats_per_row) = match travel_class {
            "1A" => ('A', 9, 4),
            "2A" => ('B', 14, 4),
            "3A" => ('C', 20, 8),
            "CC" => ('D', 15, 5),
            "2S" => ('E', 30, 8),
            _ => ('S', 25, 8),
        };
        Self { prefix, rows, seats_per_row }
    }

    pub fn capacity(&self) -> usize {
        (self.rows * self.seats_per_row) as usize
    }

    pub fn label(&self, row: u32, seat: u32) -> String {
        format!("{}{:02}{:02}", self.prefix, row, seat)
    }
}

/// Picks `count` distinct seats, or `None` when the coach holds fewer than `count`.
/// Once more than half the coach is taken, the remaining seats are filled in
/// order instead of sampled.
pub fn allocate_seats<R: Rng + ?Sized>(rng: &mut R, travel_class: &str, count: usize) -> Option<Vec<String>> {
    let pattern = SeatPattern::for_class(travel_class);
    if count > pattern.capacity() {
        return None;
    }
    let mut taken = HashSet::with_capacity(count);
    let mut seats = Vec::with_capacity(count);

    while seats.len() < count {
        let label = if taken.len() * 2 < pattern.capacity() {
            pattern.label(rng.gen_range(1..=pattern.rows), rng.gen_range(1..=pattern.seats_per_row))
        } else {
            first_free(&pattern, &taken)?
        };
        if taken.insert(label.clone()) {
            seats.push(label);
        }
    }
    Some(seats)
}

fn first_free(pattern: &SeatPattern, taken: &HashSet<String>) -> Option<String> {
    (1..=pattern.rows)
        .flat_map(|row| (1..=pattern.seats_per_row).map(move |seat| (row, seat)))
        .map(|(row, seat)| pattern.label(row, seat))
        .find(|label| !taken.contains(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn labels_follow_class_pattern() {
        let mut rng = StdRng::seed_from_u64(7);
        let seats = allocate_seats(&mut rng, "3A", 3).unwrap();
        assert_eq!(seats.len(), 3);
        for seat in &seats {
            assert!(seat.starts_with('C'));
            assert_eq!(seat.len(), 5);
            let row: u32 = seat[1..3].parse().unwrap();
            let num: u32 = seat[3..5].parse().unwrap();
            assert!((1..=20).contains(&row));
            assert!((1..=8).contains(&num));
        }
    }

    #[test]
    fn unknown_class_uses_sleeper_layout() {
        assert_eq!(SeatPattern::for_class("EC"), SeatPattern::for_class("SL"));
        assert_eq!(SeatPattern::for_class("SL").label(3, 7), "S0307");
    }

    #[test]
    fn seats_within_a_booking_are_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        // 1A has 36 berths; asking for all of them exercises the sequential fill.
        let seats = allocate_seats(&mut rng, "1A", 36).unwrap();
        let unique: HashSet<_> = seats.iter().collect();
        assert_eq!(unique.len(), 36);
    }

    #[test]
    fn more_passengers_than_berths_is_refused() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(SeatPattern::for_class("1A").capacity(), 36);
        assert!(allocate_seats(&mut rng, "1A", 40).is_none());
    }
}
