//! Emphasis presets: named bundles of parameter values.
//!
//! Presets compose; a later preset overwrites the parameters of an earlier one. Fixed
//! parameters are skipped silently.

use super::ParamSet;
use super::ParamValue;

/// Global emphasis presets tilting the whole parameter set towards a use case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emphasis {
    /// The default parameter values.
    Default,
    /// Counting feasible solutions rather than optimising.
    Counter,
    /// Constraint-programming style search: little LP work, heavy propagation.
    CpSolver,
    /// Easy instances: reduce overhead everywhere.
    EasyCip,
    /// Finding any feasible solution fast.
    Feasibility,
    /// Hard LP relaxations: limit separation and pricing work.
    HardLp,
    /// Proving optimality: emphasis on the dual side.
    Optimality,
}

/// Component-scoped presets for heuristics, presolving, and separation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginEmphasis {
    Default,
    Fast,
    Aggressive,
    Off,
}

impl ParamSet {
    /// Applies a global emphasis preset.
    pub fn set_emphasis(&mut self, emphasis: Emphasis) {
        match emphasis {
            Emphasis::Default => self.reset_all(),
            Emphasis::Counter => {
                self.set_if_possible("conflict/enable", ParamValue::Bool(false));
                self.set_if_possible("limits/maxsol", ParamValue::Int(i32::MAX));
                self.set_heuristics(PluginEmphasis::Off);
                self.set_separating(PluginEmphasis::Off);
            }
            Emphasis::CpSolver => {
                self.set_if_possible("separating/maxrounds", ParamValue::Int(0));
                self.set_if_possible("propagating/maxrounds", ParamValue::Int(1000));
                self.set_heuristics(PluginEmphasis::Fast);
            }
            Emphasis::EasyCip => {
                self.set_heuristics(PluginEmphasis::Fast);
                self.set_presolving(PluginEmphasis::Fast);
                self.set_separating(PluginEmphasis::Fast);
            }
            Emphasis::Feasibility => {
                self.set_heuristics(PluginEmphasis::Aggressive);
                self.set_if_possible("separating/maxrounds", ParamValue::Int(1));
            }
            Emphasis::HardLp => {
                self.set_heuristics(PluginEmphasis::Fast);
                self.set_separating(PluginEmphasis::Off);
                self.set_if_possible("lp/resolveiterlimit", ParamValue::Int(10_000));
            }
            Emphasis::Optimality => {
                self.set_separating(PluginEmphasis::Aggressive);
                self.set_heuristics(PluginEmphasis::Fast);
            }
        }
    }

    /// Applies a preset to all primal heuristics.
    pub fn set_heuristics(&mut self, emphasis: PluginEmphasis) {
        let freq = match emphasis {
            PluginEmphasis::Default => 10,
            PluginEmphasis::Fast => 20,
            PluginEmphasis::Aggressive => 1,
            PluginEmphasis::Off => -1,
        };
        self.set_if_possible("heuristics/freq", ParamValue::Int(freq));
    }

    /// Applies a preset to presolving.
    pub fn set_presolving(&mut self, emphasis: PluginEmphasis) {
        let rounds = match emphasis {
            PluginEmphasis::Default => -1,
            PluginEmphasis::Fast => 3,
            PluginEmphasis::Aggressive => -1,
            PluginEmphasis::Off => 0,
        };
        self.set_if_possible("presolving/maxrounds", ParamValue::Int(rounds));
        if emphasis == PluginEmphasis::Aggressive {
            self.set_if_possible("presolving/restartfac", ParamValue::Real(0.0125));
        }
    }

    /// Applies a preset to separation.
    pub fn set_separating(&mut self, emphasis: PluginEmphasis) {
        let (rounds, efficacy) = match emphasis {
            PluginEmphasis::Default => (5, 0.05),
            PluginEmphasis::Fast => (3, 0.1),
            PluginEmphasis::Aggressive => (15, 0.01),
            PluginEmphasis::Off => (0, 0.05),
        };
        self.set_if_possible("separating/maxrounds", ParamValue::Int(rounds));
        self.set_if_possible("separating/minefficacy", ParamValue::Real(efficacy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParamSet {
        let mut params = ParamSet::default();
        params
            .add_int("separating/maxrounds", "maximal separation rounds per node", 5, -1, i32::MAX)
            .unwrap();
        params
            .add_real("separating/minefficacy", "minimal cut efficacy", 0.05, 0.0, 1e20)
            .unwrap();
        params
            .add_int("heuristics/freq", "frequency of heuristic calls", 10, -1, i32::MAX)
            .unwrap();
        params
            .add_int("presolving/maxrounds", "maximal presolving rounds", -1, -1, i32::MAX)
            .unwrap();
        params.add_bool("conflict/enable", "use conflict analysis", true).unwrap();
        params
            .add_int("limits/maxsol", "maximal stored solutions", 100, 1, i32::MAX)
            .unwrap();
        params
    }

    #[test]
    fn later_presets_overwrite_earlier_ones() {
        let mut params = params();
        params.set_separating(PluginEmphasis::Aggressive);
        assert_eq!(15, params.get_int("separating/maxrounds").unwrap());

        params.set_separating(PluginEmphasis::Off);
        assert_eq!(0, params.get_int("separating/maxrounds").unwrap());
    }

    #[test]
    fn fixed_parameters_are_skipped_silently() {
        let mut params = params();
        params.fix("separating/maxrounds").unwrap();

        params.set_separating(PluginEmphasis::Off);
        assert_eq!(5, params.get_int("separating/maxrounds").unwrap());
        // The unfixed sibling parameter is still adjusted.
        assert_eq!(0.05, params.get_real("separating/minefficacy").unwrap());
    }

    #[test]
    fn default_emphasis_resets_everything() {
        let mut params = params();
        params.set_separating(PluginEmphasis::Aggressive);
        params.set_heuristics(PluginEmphasis::Off);

        params.set_emphasis(Emphasis::Default);
        assert_eq!(5, params.get_int("separating/maxrounds").unwrap());
        assert_eq!(10, params.get_int("heuristics/freq").unwrap());
    }
}
