//! Pen-travel cost model and the 2-opt route improver that drives the
//! Partner Tiny vectorizer.

/// One stop on a pen route: a pixel position with its paint color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePoint {
    pub x: i32,
    pub y: i32,
    pub color: u8,
}

/// Costs of traveling between adjacent route points.
///
/// A step of Chebyshev distance `d > 1` pays a pen-lift penalty; a unit
/// step across a color boundary pays a color-change penalty; a streak of
/// unit steps continuing in the same direction rides for free for up to
/// `max_free_line_run` steps.
#[derive(Debug, Clone, Copy)]
pub struct RouteCostModel {
    color_threshold: i32,
    pen_lift_cost: i32,
    color_change_cost: i32,
    max_free_line_run: i32,
}

impl Default for RouteCostModel {
    fn default() -> Self {
        Self::new(0, 3, 2, 4)
    }
}

impl RouteCostModel {
    pub fn new(
        color_threshold: i32,
        pen_lift_cost: i32,
        color_change_cost: i32,
        max_free_line_run: i32,
    ) -> Self {
        Self {
            color_threshold: color_threshold.max(0),
            pen_lift_cost: pen_lift_cost.max(0),
            color_change_cost: color_change_cost.max(0),
            max_free_line_run: max_free_line_run.max(1),
        }
    }

    pub fn same_color(&self, a: &RoutePoint, b: &RoutePoint) -> bool {
        (i32::from(a.color) - i32::from(b.color)).abs() <= self.color_threshold
    }

    /// Cost of one step `a -> b`; also reports the step deltas so the
    /// caller can track free-line streaks.
    fn transition_cost(&self, a: &RoutePoint, b: &RoutePoint) -> (i32, i32, i32) {
        let dx = a.x - b.x;
        let dy = a.y - b.y;
        let mut dist = dx.abs().max(dy.abs());
        if dist > 1 {
            dist += self.pen_lift_cost;
        } else if !self.same_color(a, b) {
            dist += self.color_change_cost;
        }
        (dist, dx, dy)
    }

    /// Total route cost under the free-line rule.
    pub fn total_cost(&self, route: &[RoutePoint]) -> i32 {
        if route.len() < 2 {
            return 0;
        }
        let mut sum = 0;
        let mut prev_dx = 0;
        let mut prev_dy = 0;
        let mut line_len = 0;
        for pair in route.windows(2) {
            let (mut step_cost, dx, dy) = self.transition_cost(&pair[0], &pair[1]);
            if step_cost == 1 && dx == prev_dx && dy == prev_dy && line_len < self.max_free_line_run {
                line_len += 1;
                step_cost = 0;
            } else {
                line_len = 0;
            }
            sum += step_cost;
            prev_dx = dx;
            prev_dy = dy;
        }
        sum
    }
}

/// Restart-on-improvement 2-opt route optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteOptimizer {
    cost_model: RouteCostModel,
}

impl RouteOptimizer {
    pub fn new(cost_model: RouteCostModel) -> Self {
        Self { cost_model }
    }

    pub fn cost_model(&self) -> &RouteCostModel {
        &self.cost_model
    }

    /// Reverses `route[i..=k]`, keeping the prefix and suffix intact.
    fn two_opt_swap(route: &[RoutePoint], i: usize, k: usize) -> Vec<RoutePoint> {
        let mut result = Vec::with_capacity(route.len());
        result.extend_from_slice(&route[..i]);
        result.extend(route[i..=k].iter().rev());
        result.extend_from_slice(&route[k + 1..]);
        result
    }

    /// Improves `route` by repeated sub-range reversal.
    ///
    /// After each accepted improvement the scan restarts from `(0, 1)`,
    /// biasing toward locally optimal prefixes; glyph outputs depend on
    /// this exact order. The final point is pinned and never swapped.
    /// Routes shorter than 3 points are returned unchanged.
    pub fn tsp_2opt(&self, route: &[RoutePoint]) -> Vec<RoutePoint> {
        if route.len() < 3 {
            return route.to_vec();
        }

        let mut best = route.to_vec();
        let mut best_cost = self.cost_model.total_cost(&best);
        let swappable = best.len() - 1;

        let mut improved = true;
        'scan: while improved {
            improved = false;
            for i in 0..swappable - 1 {
                for k in i + 1..swappable {
                    let candidate = Self::two_opt_swap(&best, i, k);
                    let candidate_cost = self.cost_model.total_cost(&candidate);
                    if candidate_cost < best_cost {
                        best = candidate;
                        best_cost = candidate_cost;
                        improved = true;
                        continue 'scan;
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i32, y: i32) -> RoutePoint {
        RoutePoint { x, y, color: 1 }
    }

    #[test]
    fn single_unit_step_costs_one() {
        let model = RouteCostModel::default();
        assert_eq!(model.total_cost(&[point(0, 0), point(1, 0)]), 1);
    }

    #[test]
    fn long_jump_pays_pen_lift() {
        let model = RouteCostModel::default();
        // Chebyshev distance 5 plus the default pen lift of 3.
        assert_eq!(model.total_cost(&[point(0, 0), point(5, 0)]), 8);
    }

    #[test]
    fn color_change_on_unit_step() {
        let model = RouteCostModel::default();
        let a = RoutePoint { x: 0, y: 0, color: 1 };
        let b = RoutePoint { x: 1, y: 0, color: 3 };
        assert_eq!(model.total_cost(&[a, b]), 3);
    }

    #[test]
    fn straight_line_rides_free_up_to_limit() {
        let model = RouteCostModel::default();
        // Seven unit steps right: first costs 1, next four are free,
        // then the streak is exhausted and resets.
        let route: Vec<RoutePoint> = (0..8).map(|x| point(x, 0)).collect();
        assert_eq!(model.total_cost(&route), 2);
    }

    #[test]
    fn direction_change_resets_streak() {
        let model = RouteCostModel::default();
        let route = [point(0, 0), point(1, 0), point(1, 1), point(2, 1)];
        assert_eq!(model.total_cost(&route), 3);
    }

    #[test]
    fn short_routes_unchanged() {
        let optimizer = RouteOptimizer::default();
        let route = [point(0, 0), point(9, 9)];
        assert_eq!(optimizer.tsp_2opt(&route), route.to_vec());
    }

    #[test]
    fn zigzag_route_improves() {
        // The S5 scenario: a zig-zag across two rows.
        let optimizer = RouteOptimizer::default();
        let route = [point(0, 0), point(5, 0), point(0, 1), point(5, 1)];
        let before = optimizer.cost_model().total_cost(&route);
        let optimized = optimizer.tsp_2opt(&route);
        let after = optimizer.cost_model().total_cost(&optimized);
        assert!(after < before, "expected {} < {}", after, before);
    }

    #[test]
    fn optimizer_never_worsens() {
        let optimizer = RouteOptimizer::default();
        let routes: Vec<Vec<RoutePoint>> = vec![
            (0..6).map(|x| point(x, 0)).collect(),
            vec![point(3, 3), point(0, 0), point(1, 2), point(2, 0), point(4, 4)],
            vec![point(0, 0), point(2, 2), point(0, 2), point(2, 0), point(1, 1)],
        ];
        for route in routes {
            let before = optimizer.cost_model().total_cost(&route);
            let after = optimizer.cost_model().total_cost(&optimizer.tsp_2opt(&route));
            assert!(after <= before);
        }
    }

    #[test]
    fn final_point_is_pinned() {
        let optimizer = RouteOptimizer::default();
        let route = [point(5, 5), point(0, 0), point(1, 1), point(9, 9)];
        let optimized = optimizer.tsp_2opt(&route);
        assert_eq!(optimized.last(), route.last());
    }
}
