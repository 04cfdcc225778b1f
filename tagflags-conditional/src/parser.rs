//! Recursive-descent parser for conditional restriction values.
//!
//! ```text
//! value      := clause (';' clause)*
//! clause     := access_value '@' condition
//! condition  := '(' expression ')' | expression
//! expression := rule ((';' | ',') rule)*
//! rule       := [dates [':']] [weekdays] [times]
//! dates      := date (',' date)*
//! date       := 'week' n ['-' n] | point ['-' point]
//! point      := [year] month [day]
//! weekdays   := weekday (',' weekday)*
//! weekday    := 'PH' | day ['-' day] ['[' nth (',' nth)* ']']
//! times      := hh:mm '-' hh:mm (',' hh:mm '-' hh:mm)*
//! ```
//!
//! A `,` only starts a new rule when it is followed by a date or weekday selector.

use crate::ConditionalParseError;
use crate::ast::{
    Clause, ConditionalValue, DatePoint, DateSelector, MINUTES_PER_DAY, Rule, SkippedClause,
    TimeExpression, TimeSpan, WeekdaySelector,
};
use crate::lexer::{Spanned, Token, tokenize};
use chrono::{NaiveDate, Weekday};
use std::sync::Arc;
use tracing::debug;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_number(word: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| *m == word)
        .and_then(|i| u32::try_from(i + 1).ok())
}

fn weekday(word: &str) -> Option<Weekday> {
    match word {
        "Mo" => Some(Weekday::Mon),
        "Tu" => Some(Weekday::Tue),
        "We" => Some(Weekday::Wed),
        "Th" => Some(Weekday::Thu),
        "Fr" => Some(Weekday::Fri),
        "Sa" => Some(Weekday::Sat),
        "Su" => Some(Weekday::Sun),
        _ => None,
    }
}

impl TimeExpression {
    /// Parses a bare condition such as `Mo-Fr 07:00-17:00` or `(Dec-Mar)`.
    ///
    /// # Errors
    ///
    /// Fails on anything that is not a date, weekday or time-of-day selector.
    pub fn parse(input: &str) -> Result<Self, ConditionalParseError> {
        Parser {
            tokens: tokenize(input)?,
            pos: 0,
        }
        .root()
    }
}

impl ConditionalValue {
    /// Parses a full conditional tag value such as `no @ (Nov-May); delivery @ (Mo-Fr 06:00-11:00)`.
    ///
    /// Clauses whose condition is not a time expression are kept in [`ConditionalValue::skipped`].
    ///
    /// # Errors
    ///
    /// Fails if no clause contains an `@`.
    pub fn parse(input: &str) -> Result<Self, ConditionalParseError> {
        let mut raw_clauses: Vec<(String, String)> = Vec::new();
        for part in split_top_level(input) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((value, condition)) = part.split_once('@') {
                raw_clauses.push((value.trim().to_string(), condition.trim().to_string()));
            } else if let Some((_, condition)) = raw_clauses.last_mut() {
                // An unparenthesized rule list continues the previous condition
                condition.push_str("; ");
                condition.push_str(part);
            } else {
                return Err(ConditionalParseError::MissingSeparator {
                    clause: part.to_string(),
                });
            }
        }

        if raw_clauses.is_empty() {
            return Err(ConditionalParseError::MissingSeparator {
                clause: input.to_string(),
            });
        }

        let mut clauses = Vec::with_capacity(raw_clauses.len());
        let mut skipped = Vec::new();
        for (value, condition) in raw_clauses {
            let parsed = if value.is_empty() {
                Err(ConditionalParseError::UnexpectedEnd)
            } else {
                TimeExpression::parse(&condition)
            };
            match parsed {
                Ok(expression) => clauses.push(Clause {
                    value,
                    expression: Arc::new(expression),
                    condition,
                }),
                Err(error) => {
                    debug!(%value, %condition, %error, "Skipping unsupported condition");
                    skipped.push(SkippedClause {
                        value,
                        condition,
                        error,
                    });
                }
            }
        }

        Ok(Self { clauses, skipped })
    }
}

/// Splits on `;` outside of parentheses.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

struct Parser<'a> {
    tokens: Vec<Spanned<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + offset).map(|s| s.token)
    }

    fn unexpected(&self) -> ConditionalParseError {
        match self.tokens.get(self.pos) {
            Some(Spanned {
                token: Token::Word(word),
                position,
            }) => ConditionalParseError::UnknownWord {
                word: (*word).to_string(),
                position: *position,
            },
            Some(spanned) => ConditionalParseError::UnexpectedToken {
                found: format!("{:?}", spanned.token),
                position: spanned.position,
            },
            None => ConditionalParseError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token<'_>) -> Result<(), ConditionalParseError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn root(mut self) -> Result<TimeExpression, ConditionalParseError> {
        let expression = if self.peek() == Some(Token::LParen) {
            self.pos += 1;
            let expression = self.expression()?;
            self.expect(Token::RParen)?;
            expression
        } else {
            self.expression()?
        };
        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(expression)
    }

    fn expression(&mut self) -> Result<TimeExpression, ConditionalParseError> {
        let mut rules = vec![self.rule()?];
        loop {
            match self.peek() {
                Some(Token::Semicolon) => {
                    self.pos += 1;
                    rules.push(self.rule()?);
                }
                Some(Token::Comma) if self.starts_date(1) || self.starts_weekday(1) => {
                    self.pos += 1;
                    rules.push(self.rule()?);
                }
                _ => break,
            }
        }
        Ok(TimeExpression { rules })
    }

    fn rule(&mut self) -> Result<Rule, ConditionalParseError> {
        let mut rule = Rule::default();
        if self.starts_date(0) {
            rule.dates = self.dates()?;
            if self.peek() == Some(Token::Colon) {
                self.pos += 1;
            }
        }
        if self.starts_weekday(0) {
            rule.weekdays = self.weekdays()?;
        }
        if matches!(self.peek(), Some(Token::Time(_))) {
            rule.times = self.times()?;
        }
        if rule == Rule::default() {
            return Err(self.unexpected());
        }
        Ok(rule)
    }

    fn starts_date(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some(Token::Word("week")) => true,
            Some(Token::Word(word)) => month_number(word).is_some(),
            Some(Token::Number(n)) if n >= 1000 => self.is_month_at(offset + 1),
            _ => false,
        }
    }

    fn is_month_at(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Some(Token::Word(word)) if month_number(word).is_some())
    }

    fn starts_weekday(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Some(Token::Word(word)) if word == "PH" || weekday(word).is_some())
    }

    fn dates(&mut self) -> Result<Vec<DateSelector>, ConditionalParseError> {
        let mut dates = vec![self.date()?];
        while self.peek() == Some(Token::Comma) && self.starts_date(1) {
            self.pos += 1;
            dates.push(self.date()?);
        }
        Ok(dates)
    }

    fn date(&mut self) -> Result<DateSelector, ConditionalParseError> {
        if self.peek() == Some(Token::Word("week")) {
            self.pos += 1;
            let start = self.week_number()?;
            let end = if self.peek() == Some(Token::Dash) {
                self.pos += 1;
                self.week_number()?
            } else {
                start
            };
            return Ok(DateSelector::Week { start, end });
        }

        let start = self.date_point(None)?;
        let continues = self.peek() == Some(Token::Dash)
            && (self.starts_date(1) || matches!(self.peek_at(1), Some(Token::Number(n)) if n <= 31));
        if !continues {
            return Ok(DateSelector::Range { start, end: start });
        }
        self.pos += 1;
        let end = self.date_point(Some(start))?;
        let (start, end) = normalize_years(start, end)?;
        Ok(DateSelector::Range { start, end })
    }

    /// Parses `[year] month [day]`. For range ends, a lone day number reuses the start's month.
    fn date_point(&mut self, range_start: Option<DatePoint>) -> Result<DatePoint, ConditionalParseError> {
        let mut year = None;
        if let Some(Token::Number(n)) = self.peek()
            && n >= 1000
            && self.is_month_at(1)
        {
            self.pos += 1;
            year = Some(i32::try_from(n).map_err(|_| ConditionalParseError::InvalidDate {
                reason: format!("year {n} is out of range"),
            })?);
        }

        let month = match (self.peek(), range_start) {
            (Some(Token::Word(word)), _) if month_number(word).is_some() => {
                self.pos += 1;
                month_number(word).unwrap_or(1)
            }
            (Some(Token::Number(_)), Some(start)) if year.is_none() => {
                year = start.year;
                start.month
            }
            _ => return Err(self.unexpected()),
        };

        let day = match self.peek() {
            Some(Token::Number(day)) if day < 1000 && !self.is_month_at(1) => {
                self.pos += 1;
                let valid_for = year.unwrap_or(2000);
                if NaiveDate::from_ymd_opt(valid_for, month, day).is_none() {
                    return Err(ConditionalParseError::InvalidDate {
                        reason: format!("day {day} does not exist in month {month}"),
                    });
                }
                Some(day)
            }
            _ => None,
        };

        Ok(DatePoint { year, month, day })
    }

    fn week_number(&mut self) -> Result<u32, ConditionalParseError> {
        match self.peek() {
            Some(Token::Number(week)) if (1..=53).contains(&week) => {
                self.pos += 1;
                Ok(week)
            }
            Some(Token::Number(week)) => Err(ConditionalParseError::InvalidWeek { week }),
            _ => Err(self.unexpected()),
        }
    }

    fn weekdays(&mut self) -> Result<Vec<WeekdaySelector>, ConditionalParseError> {
        let mut days = vec![self.weekday()?];
        while self.peek() == Some(Token::Comma) && self.starts_weekday(1) {
            self.pos += 1;
            days.push(self.weekday()?);
        }
        Ok(days)
    }

    fn weekday(&mut self) -> Result<WeekdaySelector, ConditionalParseError> {
        let start = match self.peek() {
            Some(Token::Word("PH")) => {
                self.pos += 1;
                return Ok(WeekdaySelector::PublicHoliday);
            }
            Some(Token::Word(word)) => weekday(word).ok_or_else(|| self.unexpected())?,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;

        let mut end = start;
        if self.peek() == Some(Token::Dash)
            && let Some(Token::Word(word)) = self.peek_at(1)
            && let Some(day) = weekday(word)
        {
            self.pos += 2;
            end = day;
        }

        let nth = if self.peek() == Some(Token::LBracket) {
            self.nth_list()?
        } else {
            Vec::new()
        };

        Ok(WeekdaySelector::Days { start, end, nth })
    }

    fn nth_list(&mut self) -> Result<Vec<i8>, ConditionalParseError> {
        self.expect(Token::LBracket)?;
        let mut nth = Vec::new();
        loop {
            let first = self.nth_value()?;
            if self.peek() == Some(Token::Dash) && matches!(self.peek_at(1), Some(Token::Number(_))) {
                self.pos += 1;
                let last = self.nth_value()?;
                nth.extend(first.min(last)..=first.max(last));
            } else {
                nth.push(first);
            }
            if self.peek() == Some(Token::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect(Token::RBracket)?;
        Ok(nth)
    }

    fn nth_value(&mut self) -> Result<i8, ConditionalParseError> {
        let negative = self.peek() == Some(Token::Dash);
        if negative {
            self.pos += 1;
        }
        match self.peek() {
            Some(Token::Number(n)) if (1..=5).contains(&n) => {
                self.pos += 1;
                let value = i8::try_from(n).unwrap_or(1);
                Ok(if negative { -value } else { value })
            }
            Some(Token::Number(n)) => Err(ConditionalParseError::InvalidDate {
                reason: format!("weekday occurrence {n} is not in 1..=5"),
            }),
            _ => Err(self.unexpected()),
        }
    }

    fn times(&mut self) -> Result<Vec<TimeSpan>, ConditionalParseError> {
        let mut spans = vec![self.time_span()?];
        while self.peek() == Some(Token::Comma) && matches!(self.peek_at(1), Some(Token::Time(_))) {
            self.pos += 1;
            spans.push(self.time_span()?);
        }
        Ok(spans)
    }

    fn time_span(&mut self) -> Result<TimeSpan, ConditionalParseError> {
        let Some(Token::Time(start)) = self.peek() else {
            return Err(self.unexpected());
        };
        if start >= MINUTES_PER_DAY {
            return Err(ConditionalParseError::InvalidTime {
                value: format!("{:02}:{:02}", start / 60, start % 60),
            });
        }
        self.pos += 1;
        self.expect(Token::Dash)?;
        let Some(Token::Time(end)) = self.peek() else {
            return Err(self.unexpected());
        };
        self.pos += 1;

        // 18:00-10:00 runs into the next morning
        let end = if end < start { end + MINUTES_PER_DAY } else { end };
        Ok(TimeSpan { start, end })
    }
}

/// Fills in a missing year on one side of a range from the other side.
fn normalize_years(
    mut start: DatePoint,
    mut end: DatePoint,
) -> Result<(DatePoint, DatePoint), ConditionalParseError> {
    let wraps = end.end_key() < start.start_key();
    match (start.year, end.year) {
        (Some(year), None) => end.year = Some(if wraps { year + 1 } else { year }),
        (None, Some(year)) => start.year = Some(if wraps { year - 1 } else { year }),
        (Some(start_year), Some(end_year))
            if (start_year, start.start_key()) > (end_year, end.end_key()) =>
        {
            return Err(ConditionalParseError::InvalidDate {
                reason: format!("range ends before it starts ({start_year} to {end_year})"),
            });
        }
        _ => {}
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use crate::ConditionalParseError;
    use crate::ast::{ConditionalValue, DatePoint, DateSelector, TimeExpression, TimeSpan, WeekdaySelector};
    use chrono::Weekday;

    #[test]
    fn seasonal_rules_snapshot() {
        let expression = TimeExpression::parse(
            "Apr 01-Sep 30: Mo-Sa 00:00-06:00,20:00-24:00; Su,PH 00:00-24:00",
        )
        .expect("valid");
        if !cfg!(miri) {
            insta::assert_debug_snapshot!(expression);
        }
    }

    #[test]
    fn comma_before_a_date_starts_a_new_rule() {
        let expression =
            TimeExpression::parse("(Oct-Mar 18:00-08:00, Apr-Sep 21:00-07:00)").expect("valid");
        assert_eq!(expression.rules.len(), 2);
        assert_eq!(
            expression.rules[0].times,
            vec![TimeSpan {
                start: 18 * 60,
                end: 24 * 60 + 8 * 60
            }]
        );

        let expression = TimeExpression::parse("(21:00-07:00,15:30-17:00)").expect("valid");
        assert_eq!(expression.rules.len(), 1);
        assert_eq!(expression.rules[0].times.len(), 2);
    }

    #[test]
    fn date_points() {
        let expression = TimeExpression::parse("2014 Aug 14-Mar 10").expect("valid");
        assert_eq!(
            expression.rules[0].dates,
            vec![DateSelector::Range {
                start: DatePoint {
                    year: Some(2014),
                    month: 8,
                    day: Some(14)
                },
                end: DatePoint {
                    year: Some(2015),
                    month: 3,
                    day: Some(10)
                },
            }]
        );

        let expression = TimeExpression::parse("Mar 15-20").expect("valid");
        assert_eq!(
            expression.rules[0].dates,
            vec![DateSelector::Range {
                start: DatePoint {
                    year: None,
                    month: 3,
                    day: Some(15)
                },
                end: DatePoint {
                    year: None,
                    month: 3,
                    day: Some(20)
                },
            }]
        );

        assert!(matches!(
            TimeExpression::parse("Feb 30"),
            Err(ConditionalParseError::InvalidDate { .. })
        ));
        assert!(matches!(
            TimeExpression::parse("2015 Mar-2014 Mar"),
            Err(ConditionalParseError::InvalidDate { .. })
        ));
    }

    #[test]
    fn weeks_and_nth_weekdays() {
        let expression = TimeExpression::parse("week 46-20").expect("valid");
        assert_eq!(
            expression.rules[0].dates,
            vec![DateSelector::Week { start: 46, end: 20 }]
        );
        assert!(matches!(
            TimeExpression::parse("week 54"),
            Err(ConditionalParseError::InvalidWeek { week: 54 })
        ));

        let expression = TimeExpression::parse("May Su[-1] 09:30-18:00").expect("valid");
        assert_eq!(
            expression.rules[0].weekdays,
            vec![WeekdaySelector::Days {
                start: Weekday::Sun,
                end: Weekday::Sun,
                nth: vec![-1]
            }]
        );
        let expression = TimeExpression::parse("Mo[1-2,4]").expect("valid");
        assert_eq!(
            expression.rules[0].weekdays,
            vec![WeekdaySelector::Days {
                start: Weekday::Mon,
                end: Weekday::Mon,
                nth: vec![1, 2, 4]
            }]
        );
    }

    #[test]
    fn three_letter_weekdays_are_rejected() {
        assert!(matches!(
            TimeExpression::parse("Sat"),
            Err(ConditionalParseError::UnknownWord { ref word, .. }) if word == "Sat"
        ));
        assert!(TimeExpression::parse("").is_err());
        assert!(TimeExpression::parse("(Mo-Fr").is_err());
        assert!(TimeExpression::parse("sunrise-sunset").is_err());
    }

    #[test]
    fn clauses_and_skipped_conditions() {
        let value = ConditionalValue::parse("no @ (Nov-May); no @ (20:00-07:00)").expect("valid");
        assert_eq!(value.clauses.len(), 2);
        assert!(value.skipped.is_empty());

        let value = ConditionalValue::parse("no @ wet; delivery @ (Mo-Fr 06:00-11:00); no @ (weight>7.5)")
            .expect("valid");
        assert_eq!(value.clauses.len(), 1);
        assert_eq!(value.clauses[0].value, "delivery");
        assert_eq!(value.skipped.len(), 2);

        let value = ConditionalValue::parse("no @ Mo-Fr 20:00-02:00; Sa 16:00-02:00").expect("valid");
        assert_eq!(value.clauses.len(), 1);
        assert_eq!(value.clauses[0].expression.rules.len(), 2);

        assert!(matches!(
            ConditionalValue::parse("no"),
            Err(ConditionalParseError::MissingSeparator { .. })
        ));
    }
}
