use super::token::{Keyword, Token};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate,
    Plus,
    LogicalNot,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Power,
    Modulo,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterEq,
    LessThan,
    LessEq,
    In,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepOperator {
    Increment,
    Decrement,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::LogicalNot => "not",
        }
    }
}

impl LogicalOperator {
    pub fn from_token(token: &Token) -> Option<LogicalOperator> {
        match token {
            Token::Keyword(Keyword::And) => Some(LogicalOperator::And),
            Token::Keyword(Keyword::Or) => Some(LogicalOperator::Or),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        }
    }

    pub fn dunder(&self) -> &'static str {
        match self {
            LogicalOperator::And => "__and__",
            LogicalOperator::Or => "__or__",
        }
    }
}

impl BinaryOperator {
    pub fn comparison_from_token(token: &Token) -> Option<BinaryOperator> {
        let op = match token {
            Token::DoubleEq => BinaryOperator::EqualTo,
            Token::BangEq => BinaryOperator::NotEqualTo,
            Token::RightAngle => BinaryOperator::GreaterThan,
            Token::RightAngleEq => BinaryOperator::GreaterEq,
            Token::LeftAngle => BinaryOperator::LessThan,
            Token::LeftAngleEq => BinaryOperator::LessEq,
            Token::Keyword(Keyword::In) => BinaryOperator::In,
            _ => return None,
        };
        Some(op)
    }

    pub fn additive_from_token(token: &Token) -> Option<BinaryOperator> {
        match token {
            Token::Plus => Some(BinaryOperator::Add),
            Token::Minus => Some(BinaryOperator::Subtract),
            _ => None,
        }
    }

    pub fn multiplicative_from_token(token: &Token) -> Option<BinaryOperator> {
        match token {
            Token::Asterisk => Some(BinaryOperator::Multiply),
            Token::Slash => Some(BinaryOperator::Divide),
            Token::DoubleSlash => Some(BinaryOperator::IntDivide),
            Token::Percent => Some(BinaryOperator::Modulo),
            _ => None,
        }
    }

    /// The operator behind a compound assignment token such as `+=`.
    pub fn compound_from_token(token: &Token) -> Option<BinaryOperator> {
        let op = match token {
            Token::PlusEq => BinaryOperator::Add,
            Token::MinusEq => BinaryOperator::Subtract,
            Token::AsteriskEq => BinaryOperator::Multiply,
            Token::SlashEq => BinaryOperator::Divide,
            Token::DoubleSlashEq => BinaryOperator::IntDivide,
            Token::PercentEq => BinaryOperator::Modulo,
            Token::CaretEq => BinaryOperator::Power,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::IntDivide => "//",
            BinaryOperator::Power => "^",
            BinaryOperator::Modulo => "%",
            BinaryOperator::EqualTo => "==",
            BinaryOperator::NotEqualTo => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::In => "in",
        }
    }

    /// Name of the method a class implements to overload this operator.
    pub fn dunder(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "__add__",
            BinaryOperator::Subtract => "__sub__",
            BinaryOperator::Multiply => "__mul__",
            BinaryOperator::Divide => "__div__",
            BinaryOperator::IntDivide => "__idiv__",
            BinaryOperator::Power => "__pow__",
            BinaryOperator::Modulo => "__mod__",
            BinaryOperator::EqualTo => "__eq__",
            BinaryOperator::NotEqualTo => "__ne__",
            BinaryOperator::GreaterThan => "__gt__",
            BinaryOperator::GreaterEq => "__gte__",
            BinaryOperator::LessThan => "__lt__",
            BinaryOperator::LessEq => "__lte__",
            BinaryOperator::In => "__contains__",
        }
    }
}

impl StepOperator {
    pub fn from_token(token: &Token) -> Option<StepOperator> {
        match token {
            Token::PlusPlus => Some(StepOperator::Increment),
            Token::MinusMinus => Some(StepOperator::Decrement),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            StepOperator::Increment => "++",
            StepOperator::Decrement => "--",
        }
    }

    pub fn as_binary(&self) -> BinaryOperator {
        match self {
            StepOperator::Increment => BinaryOperator::Add,
            StepOperator::Decrement => BinaryOperator::Subtract,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        assert_eq!(
            BinaryOperator::additive_from_token(&Token::Plus),
            Some(BinaryOperator::Add)
        );
        assert_eq!(
            BinaryOperator::multiplicative_from_token(&Token::DoubleSlash),
            Some(BinaryOperator::IntDivide)
        );
        assert_eq!(
            BinaryOperator::comparison_from_token(&Token::Keyword(Keyword::In)),
            Some(BinaryOperator::In)
        );
        assert_eq!(
            BinaryOperator::compound_from_token(&Token::CaretEq),
            Some(BinaryOperator::Power)
        );
        assert_eq!(BinaryOperator::additive_from_token(&Token::Asterisk), None);
        assert_eq!(LogicalOperator::from_token(&Token::Plus), None);
    }

    #[test]
    fn test_dunders() {
        assert_eq!(BinaryOperator::Add.dunder(), "__add__");
        assert_eq!(BinaryOperator::In.dunder(), "__contains__");
        assert_eq!(StepOperator::Decrement.as_binary(), BinaryOperator::Subtract);
    }
}
